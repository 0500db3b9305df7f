use time::OffsetDateTime;
use uuid::Uuid;

/// Builds a minimal WARC/1.0 `response` record wrapping a raw HTTP response. This is a narrow
/// encoder, not a full WARC library: it targets exactly the one record type the Capture Worker
/// needs and skips interactions with external WARC writers (segmenting, compression, indexes).
pub fn response_record(target_uri: &str, status: u16, headers: &str, body: &[u8]) -> Vec<u8> {
    let http_response = format!("HTTP/1.1 {status} {}\r\n{headers}\r\n\r\n", status_text(status));
    let mut payload = http_response.into_bytes();
    payload.extend_from_slice(body);

    let date = OffsetDateTime::now_utc();
    let record_id = format!("urn:uuid:{}", Uuid::new_v4());
    let warc_header = format!(
        "WARC/1.0\r\n\
         WARC-Type: response\r\n\
         WARC-Target-URI: {target_uri}\r\n\
         WARC-Date: {}\r\n\
         WARC-Record-ID: <{record_id}>\r\n\
         Content-Type: application/http; msgtype=response\r\n\
         Content-Length: {}\r\n\r\n",
        date.format(&time::format_description::well_known::Iso8601::DEFAULT).unwrap_or_default(),
        payload.len(),
    );

    let mut record = warc_header.into_bytes();
    record.extend_from_slice(&payload);
    record.extend_from_slice(b"\r\n\r\n");
    record
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        302 => "Found",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_contains_required_warc_headers() {
        let record = response_record("https://example.gov", 200, "Content-Type: text/html\r\n", b"<html></html>");
        let text = String::from_utf8_lossy(&record);
        assert!(text.starts_with("WARC/1.0"));
        assert!(text.contains("WARC-Type: response"));
        assert!(text.contains("WARC-Target-URI: https://example.gov"));
        assert!(text.contains("WARC-Record-ID: <urn:uuid:"));
        assert!(text.contains("HTTP/1.1 200 OK"));
    }
}
