use std::path::Path;
use std::time::Duration;

/// Next delay in an exponential backoff sequence, capped at `max`.
pub(crate) fn backoff(current: Duration, max: Duration) -> Duration {
    let next = current.saturating_mul(2);
    if next > max { max } else { next }
}

/// Appends `name=value` to a URL that may or may not already carry a query.
pub(crate) fn append_query(url: &str, name: &str, value: impl std::fmt::Display) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, sep, name, value)
}

pub(crate) fn product_url(base: &str, id: &str) -> String {
    format!("{}/odata/v1/Products('{}')/$value", base.trim_end_matches('/'), id)
}

pub(crate) fn online_url(base: &str, id: &str) -> String {
    format!(
        "{}/odata/v1/Products('{}')/Online/$value",
        base.trim_end_matches('/'),
        id
    )
}

pub(crate) fn search_url(base: &str) -> String {
    format!("{}/search", base.trim_end_matches('/'))
}

/// Extracts the file name from a `Content-Disposition` value such as
/// `attachment; filename="S2A_MSIL2A.zip"`.
///
/// Parameter names are matched case-insensitively and the extended
/// `filename*=UTF-8''...` form wins over a plain `filename`. Only the final
/// path component is returned.
pub(crate) fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;
    for param in value.split(';').skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("filename*") {
            extended = decode_ext_value(strip_quotes(raw));
        } else if key.eq_ignore_ascii_case("filename") {
            plain = Some(strip_quotes(raw).to_string());
        }
    }
    let name = extended.or(plain)?;
    Path::new(&name)
        .file_name()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && *s != "..")
        .map(str::to_string)
}

/// Decodes an extended parameter value, `charset'language'percent-encoded`.
fn decode_ext_value(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;

    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let escape = &bytes[i + 1..i + 3];
            if escape.iter().all(u8::is_ascii_hexdigit) {
                if let Ok(b) = hex::decode(escape) {
                    out.push(b[0]);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(out).ok()
    } else {
        // ISO-8859-1 maps every byte to the code point of the same value.
        Some(out.into_iter().map(char::from).collect())
    }
}

pub(crate) fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap() {
        let max = Duration::from_secs(5);
        assert_eq!(backoff(Duration::from_secs(1), max), Duration::from_secs(2));
        assert_eq!(backoff(Duration::from_secs(2), max), Duration::from_secs(4));
        assert_eq!(backoff(Duration::from_secs(4), max), max);
        assert_eq!(backoff(Duration::ZERO, max), Duration::ZERO);
    }

    #[test]
    fn disposition_variants() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"S2A.zip\"").as_deref(),
            Some("S2A.zip")
        );
        assert_eq!(
            filename_from_disposition("inline;filename=plain.zip; size=3").as_deref(),
            Some("plain.zip")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"../../etc/passwd\"").as_deref(),
            Some("passwd")
        );
        assert_eq!(filename_from_disposition("attachment"), None);
        assert_eq!(filename_from_disposition("attachment; filename=\"\""), None);
    }

    #[test]
    fn disposition_parameter_names_ignore_case() {
        assert_eq!(
            filename_from_disposition("attachment; FileName=\"S2B.zip\"").as_deref(),
            Some("S2B.zip")
        );
        assert_eq!(
            filename_from_disposition("ATTACHMENT;FILENAME=upper.zip").as_deref(),
            Some("upper.zip")
        );
    }

    #[test]
    fn extended_filename_is_decoded() {
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''S2A%20MSIL2A%E2%82%AC.zip")
                .as_deref(),
            Some("S2A MSIL2A\u{20ac}.zip")
        );
        assert_eq!(
            filename_from_disposition(
                "attachment; filename=\"fallback.zip\"; filename*=utf-8''preferred.zip"
            )
            .as_deref(),
            Some("preferred.zip")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename*=iso-8859-1'en'caf%E9.zip").as_deref(),
            Some("caf\u{e9}.zip")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''..%2F..%2Fetc%2Fpasswd")
                .as_deref(),
            Some("passwd")
        );
    }

    #[test]
    fn endpoint_urls() {
        assert_eq!(
            product_url("https://hub/dhus/", "abc"),
            "https://hub/dhus/odata/v1/Products('abc')/$value"
        );
        assert_eq!(
            online_url("https://hub/dhus", "abc"),
            "https://hub/dhus/odata/v1/Products('abc')/Online/$value"
        );
        assert_eq!(append_query("http://h/s?q=x", "start", 100), "http://h/s?q=x&start=100");
        assert_eq!(append_query("http://h/s", "q", "x"), "http://h/s?q=x");
    }
}
