use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};
use tracing::debug;

/// undoes the upstream Content-Encoding, only the encodings the header profile advertises
pub fn decode_content(bytes: &[u8], content_encoding: Option<&str>) -> std::io::Result<Vec<u8>> {
    let encoding = content_encoding
        .map(|e| e.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match encoding.as_str() {
        "" | "identity" => Ok(bytes.to_vec()),
        "zstd" => {
            debug!("decompressing zstd-encoded response");
            zstd::decode_all(bytes)
        }
        "gzip" | "x-gzip" => {
            debug!("decompressing gzip-encoded response");
            let mut decoder = GzDecoder::new(bytes);
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed)?;
            Ok(decompressed)
        }
        "deflate" => {
            debug!("decompressing deflate-encoded response");
            // deflate in http is zlib wrapped, some servers send it raw anyway
            let mut decompressed = Vec::new();
            match ZlibDecoder::new(bytes).read_to_end(&mut decompressed) {
                Ok(_) => Ok(decompressed),
                Err(_) => {
                    let mut raw = Vec::new();
                    flate2::read::DeflateDecoder::new(bytes).read_to_end(&mut raw)?;
                    Ok(raw)
                }
            }
        }
        other => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unsupported content encoding '{}'", other),
        )),
    }
}

/// reads a whole response as text, decoding it first; undecodable bodies come back lossy
pub async fn response_text(response: reqwest::Response) -> reqwest::Result<String> {
    let encoding = response
        .headers()
        .get(reqwest::header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let bytes = response.bytes().await?;

    let decoded = decode_content(&bytes, encoding.as_deref()).unwrap_or_else(|e| {
        debug!("could not decode body ({}), using it as is", e);
        bytes.to_vec()
    });

    Ok(String::from_utf8_lossy(&decoded).into_owned())
}
