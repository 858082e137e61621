//! Operator-facing text carried in `info`/`warn`/`error` events and results.

pub const RESULT_MISSING: &str = "동기화 결과를 수신하지 못했습니다.";
pub const CANCELLED: &str = "동기화가 취소되었습니다.";
pub const NO_MAPPED_COLUMNS: &str = "매핑된 컬럼이 없습니다. 컬럼 매핑을 확인해 주세요.";
pub const EMPTY_SHEET: &str = "시트에 헤더 행이 없습니다.";

pub fn preparing(sheet: &str, table: &str) -> String {
    format!("'{}' 시트를 '{}' 테이블로 동기화합니다.", sheet, table)
}

pub fn rows_loaded(rows: usize) -> String {
    format!("시트에서 {}개 행을 읽었습니다.", rows)
}

pub fn truncated(rows: u64) -> String {
    format!("기존 데이터 {}건을 삭제했습니다.", rows)
}

pub fn truncate_failed(reason: &str) -> String {
    format!("테이블 초기화에 실패했습니다: {}", reason)
}

pub fn source_failed(reason: &str) -> String {
    format!("시트를 읽지 못했습니다: {}", reason)
}

pub fn schema_failed(reason: &str) -> String {
    format!("테이블 스키마를 불러오지 못했습니다: {}", reason)
}

pub fn store_failed(reason: &str) -> String {
    format!("데이터베이스 오류로 동기화를 중단했습니다: {}", reason)
}

pub fn unknown_destinations(columns: &[String]) -> String {
    format!(
        "테이블에 없는 컬럼 매핑을 제외했습니다: {}",
        columns.join(", ")
    )
}

pub fn stale_sources(columns: &[String]) -> String {
    format!(
        "시트에 없는 원본 컬럼은 매핑되지 않은 것으로 처리합니다: {}",
        columns.join(", ")
    )
}

pub fn no_natural_key(table: &str) -> String {
    format!(
        "'{}' 테이블의 키 컬럼이 매핑되지 않아 증분 비교 없이 모든 행을 추가합니다.",
        table
    )
}

pub fn row_failed(row_number: u64, reason: &str) -> String {
    format!("{}행 처리 실패: {}", row_number, reason)
}

pub fn completed(inserted: u64, updated: u64, errors: u64) -> String {
    if errors == 0 {
        format!("동기화 완료: 추가 {}건, 업데이트 {}건", inserted, updated)
    } else {
        format!(
            "동기화 완료: 추가 {}건, 업데이트 {}건, 오류 {}건",
            inserted, updated, errors
        )
    }
}
