//! TextNative adapter - handles plain text uploads.

use async_trait::async_trait;

use cvroute_core::{DocumentKind, Result, TextSource};

/// Reads bytes as UTF-8 (with lossy conversion for invalid sequences).
pub struct TextNativeAdapter;

#[async_trait]
impl TextSource for TextNativeAdapter {
    fn kind(&self) -> DocumentKind {
        DocumentKind::PlainText
    }

    async fn read_text(&self, data: &[u8], _filename: &str) -> Result<String> {
        let text = String::from_utf8_lossy(data);
        // Byte-order marks from Windows editors are not content.
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true) // No external dependencies
    }

    fn name(&self) -> &str {
        "text_native"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_native_read() {
        let text = TextNativeAdapter
            .read_text(b"Thabo Nkosi\nDurban", "cv.txt")
            .await
            .unwrap();
        assert_eq!(text, "Thabo Nkosi\nDurban");
    }

    #[tokio::test]
    async fn test_text_native_invalid_utf8_is_lossy() {
        let text = TextNativeAdapter
            .read_text(&[b'a', 0xff, b'b'], "cv.txt")
            .await
            .unwrap();
        assert!(text.starts_with('a'));
        assert!(text.ends_with('b'));
    }

    #[tokio::test]
    async fn test_text_native_strips_bom() {
        let text = TextNativeAdapter
            .read_text("\u{feff}Name".as_bytes(), "cv.txt")
            .await
            .unwrap();
        assert_eq!(text, "Name");
    }

    #[tokio::test]
    async fn test_text_native_health() {
        assert!(TextNativeAdapter.health_check().await.unwrap());
        assert_eq!(TextNativeAdapter.name(), "text_native");
    }
}
