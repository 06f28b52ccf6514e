//! Localized HTML error pages for the fetch path.
//!
//! Fetch failures are rendered as a small HTML page carrying the message in
//! all three fixed locales at once; there is no per-client negotiation.

/// Error codes with a localized page rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageCode {
    /// Registration absent, or the upstream answered non-200.
    NotFound,
    /// Registration past its deadline.
    Expired,
    /// Upstream unreachable or a local fault while fetching.
    DownloadError,
}

impl PageCode {
    /// Stable key for the code, as used in the message table.
    pub fn key(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Expired => "EXPIRED",
            Self::DownloadError => "DOWNLOAD_ERROR",
        }
    }
}

/// The fixed locales, in page order.
const LOCALES: [&str; 3] = ["en", "ro", "ru"];

/// Static localized message table.
fn message(locale: &str, code: PageCode) -> &'static str {
    match (locale, code) {
        ("en", PageCode::NotFound) => "The requested file could not be found.",
        ("en", PageCode::Expired) => "The requested file has expired.",
        ("en", PageCode::DownloadError) => "The file could not be downloaded.",
        ("ro", PageCode::NotFound) => "Fișierul solicitat nu a fost găsit.",
        ("ro", PageCode::Expired) => "Fișierul solicitat a expirat.",
        ("ro", PageCode::DownloadError) => "Fișierul nu a putut fi descărcat.",
        ("ru", PageCode::NotFound) => "Запрошенный файл не найден.",
        ("ru", PageCode::Expired) => "Срок действия запрошенного файла истёк.",
        ("ru", PageCode::DownloadError) => "Не удалось загрузить файл.",
        _ => "An error occurred.",
    }
}

/// Render the error page for a code, all locales together.
pub fn render_error_page(code: PageCode) -> String {
    let mut body = String::from(
        "<!doctype html>\n<html lang=\"en\">\n  <head>\n    <title>Error</title>\n  </head>\n  <body>\n    <h1>!</h1>\n",
    );
    for locale in LOCALES {
        body.push_str(&format!("    <h2>{}</h2>\n", message(locale, code)));
    }
    body.push_str("  </body>\n</html>\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_has_all_locales() {
        for code in [PageCode::NotFound, PageCode::Expired, PageCode::DownloadError] {
            for locale in LOCALES {
                assert_ne!(
                    message(locale, code),
                    "An error occurred.",
                    "missing {locale} message for {:?}",
                    code
                );
            }
        }
    }

    #[test]
    fn page_renders_all_three_messages() {
        let page = render_error_page(PageCode::Expired);
        assert!(page.contains("has expired"));
        assert!(page.contains("a expirat"));
        assert!(page.contains("истёк"));
        assert!(page.starts_with("<!doctype html>"));
    }
}
