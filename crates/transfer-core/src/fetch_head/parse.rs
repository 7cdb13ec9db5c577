//! Parse HTTP response header lines into a `HeadResult`.

use super::HeadResult;

pub(crate) fn parse_headers(lines: &[String], status_line_code: Option<u32>) -> HeadResult {
    let mut content_length = None;
    let mut accept_ranges = false;
    let mut etag = None;
    let mut last_modified = None;
    let mut content_disposition = None;
    let mut content_type = None;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    content_length = Some(n);
                }
            } else if name.eq_ignore_ascii_case("accept-ranges") {
                accept_ranges = value.eq_ignore_ascii_case("bytes");
            } else if name.eq_ignore_ascii_case("etag") {
                etag = Some(value.trim_matches('"').to_string());
            } else if name.eq_ignore_ascii_case("last-modified") {
                last_modified = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("content-disposition") {
                content_disposition = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("content-type") {
                content_type = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("content-range") {
                // "bytes 0-0/12345" — recover the true size from a range probe.
                if let Some(total) = value.rsplit('/').next() {
                    if let Ok(n) = total.parse::<u64>() {
                        content_length = Some(n);
                    }
                }
            }
        }
    }

    // A 206 response to our 0-0 probe implies the server honors ranges even
    // if it omitted an explicit Accept-Ranges header.
    if status_line_code == Some(206) {
        accept_ranges = true;
    }

    HeadResult {
        content_length,
        accept_ranges,
        etag,
        last_modified,
        content_disposition,
        content_type,
    }
}
