//! User-facing text for client-side failures.

pub const TIMEOUT: &str = "요청 시간이 초과되었습니다. 잠시 후 다시 시도해 주세요.";
pub const CANCELLED: &str = "요청이 취소되었습니다.";
pub const UNAUTHORIZED: &str = "인증이 만료되었습니다. 다시 로그인해 주세요.";
pub const PERMISSION_DENIED: &str =
    "스프레드시트에 접근할 권한이 없습니다. 서비스 계정에 공유되어 있는지 확인해 주세요.";
pub const NOT_FOUND: &str = "스프레드시트 또는 시트를 찾을 수 없습니다. ID를 확인해 주세요.";
pub const QUOTA_EXCEEDED: &str = "Google API 사용량 한도를 초과했습니다. 잠시 후 다시 시도해 주세요.";
pub const NETWORK: &str = "네트워크 연결을 확인해 주세요.";
pub const UNAVAILABLE: &str = "서버를 일시적으로 사용할 수 없습니다. 잠시 후 다시 시도해 주세요.";
pub const DECODE: &str = "서버 응답을 해석하지 못했습니다.";
pub const NO_VALID_SHEETS: &str = "조건에 맞는 시트가 없습니다. 시트 이름을 확인해 주세요.";

pub fn api_failed(message: &str) -> String {
    format!("요청에 실패했습니다: {}", message)
}
