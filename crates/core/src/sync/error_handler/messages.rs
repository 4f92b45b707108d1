// Localized user-facing messages
use versesync_domain::Locale;

use super::classify::ErrorKind;

pub fn user_message(kind: ErrorKind, locale: Locale) -> &'static str {
    match locale {
        Locale::Ko => match kind {
            ErrorKind::Network => "네트워크 연결을 확인해주세요.",
            ErrorKind::Authentication => "로그인이 필요합니다. 다시 로그인해주세요.",
            ErrorKind::Authorization => "이 작업을 수행할 권한이 없습니다.",
            ErrorKind::Validation => "입력한 정보를 확인해주세요.",
            ErrorKind::Server => "서버에 일시적인 문제가 발생했습니다. 잠시 후 다시 시도해주세요.",
            ErrorKind::Client => "요청을 처리할 수 없습니다.",
            ErrorKind::Timeout => "요청 시간이 초과되었습니다. 다시 시도해주세요.",
            ErrorKind::Unknown => "알 수 없는 오류가 발생했습니다.",
        },
        Locale::En => match kind {
            ErrorKind::Network => "Please check your network connection.",
            ErrorKind::Authentication => "Your session has expired. Please sign in again.",
            ErrorKind::Authorization => "You don't have permission to do that.",
            ErrorKind::Validation => "Please check the information you entered.",
            ErrorKind::Server => "The server ran into a temporary problem. Please try again shortly.",
            ErrorKind::Client => "The request could not be processed.",
            ErrorKind::Timeout => "The request timed out. Please try again.",
            ErrorKind::Unknown => "An unknown error occurred.",
        },
    }
}
