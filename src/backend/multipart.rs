//! `multipart/form-data` encoding for document uploads.

use uuid::Uuid;

enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        let hex = format!("{:x}", Uuid::new_v4().simple());
        Self {
            boundary: format!("----allotment-pdf-{hex}"),
            parts: Vec::new(),
        }
    }

    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.parts.push(Part::Text {
            name: escape(name),
            value: value.to_string(),
        });
        self
    }

    pub fn file(&mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> &mut Self {
        self.parts.push(Part::File {
            name: escape(name),
            file_name: escape(file_name),
            content_type: content_type.to_string(),
            bytes: bytes.to_vec(),
        });
        self
    }

    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        let mut body = Vec::new();
        for part in self.parts {
            body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            match part {
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body
    }
}

fn escape(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '"' => '\'',
            '\r' | '\n' => ' ',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_is_framed_by_boundary() {
        let mut form = MultipartForm::new();
        form.text("name", "Amit").file("file", "a.pdf", "application/pdf", b"PDF");
        let content_type = form.content_type();
        let boundary = content_type
            .split("boundary=")
            .nth(1)
            .expect("boundary present")
            .to_string();
        let body = String::from_utf8(form.into_body()).expect("ascii body");

        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
        assert_eq!(body.matches(&format!("--{boundary}\r\n")).count(), 2);
        assert!(body.contains("Content-Type: application/pdf\r\n\r\nPDF\r\n"));
    }

    #[test]
    fn test_quotes_in_field_names_are_neutralised() {
        let mut form = MultipartForm::new();
        form.file("file", "Agreement \"final\".pdf", "application/pdf", b"");
        let body = String::from_utf8(form.into_body()).expect("ascii body");
        assert!(body.contains("filename=\"Agreement 'final'.pdf\""));
    }
}
