//! JSON bodies exchanged between the daemon and companion clients.
//!
//! Field names follow the camelCase convention the remote-control clients
//! already speak, so every struct here renames its fields on the wire.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// `status` value for a successful pointer command.
pub const STATUS_OK: &str = "ok";

/// `status` value for a failed pointer command.
pub const STATUS_ERROR: &str = "error";

/// Error code sent when the input-injection service is not running.
pub const CODE_SERVICE_UNAVAILABLE: &str = "accessibility_not_enabled";

/// Serialize a wire body to JSON bytes.
pub fn to_json<T: Serialize>(body: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(body)?)
}

/// Parse a wire body from JSON bytes.
pub fn from_json<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// A single entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Path relative to the browsing root, with a leading `/`.
    pub path: String,
    /// Absolute path on the device.
    pub full_path: String,
    /// Size in bytes. Present for files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Whether the file looks like audio or video. Present for files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_media: Option<bool>,
}

/// Response body of `GET /file/dir/<path>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
    /// Relative path of the parent directory; absent at the browsing root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Sub-directories, sorted case-insensitively.
    pub dirs: Vec<FileEntry>,
    /// Files, sorted case-insensitively.
    pub files: Vec<FileEntry>,
}

/// Response body of `POST /file/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadReply {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Generic `{status, message?, code?}` reply used by the pointer endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl StatusReply {
    /// `{"status":"ok"}`
    pub fn ok() -> Self {
        Self {
            status: STATUS_OK.to_string(),
            message: None,
            code: None,
        }
    }

    /// `{"status":"error","message":...}`
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            message: Some(message.into()),
            code: None,
        }
    }

    /// Attach a machine-readable error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Response body of `POST /mouse/move` and `POST /mouse/reset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseMoved {
    pub status: String,
    pub x: i32,
    pub y: i32,
}

impl MouseMoved {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            x,
            y,
        }
    }
}

/// Response body of `GET /mouse/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseStatus {
    pub service_enabled: bool,
    pub mouse_x: i32,
    pub mouse_y: i32,
    pub screen_width: i32,
    pub screen_height: i32,
    pub api_level: u32,
}

/// Reply for endpoints kept only for old clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyReply {
    pub success: bool,
    pub message: String,
}

impl LegacyReply {
    pub fn removed() -> Self {
        Self {
            success: false,
            message: "removed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_entry_omits_file_fields() {
        let entry = FileEntry {
            name: "Movies".to_string(),
            path: "/Movies".to_string(),
            full_path: "/storage/Movies".to_string(),
            size: None,
            is_media: None,
        };

        let json = String::from_utf8(to_json(&entry).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"name":"Movies","path":"/Movies","fullPath":"/storage/Movies"}"#
        );
    }

    #[test]
    fn test_file_entry_uses_camel_case() {
        let entry = FileEntry {
            name: "clip.mp4".to_string(),
            path: "/clip.mp4".to_string(),
            full_path: "/storage/clip.mp4".to_string(),
            size: Some(2048),
            is_media: Some(true),
        };

        let value: serde_json::Value = serde_json::from_slice(&to_json(&entry).unwrap()).unwrap();
        assert_eq!(value["fullPath"], "/storage/clip.mp4");
        assert_eq!(value["size"], 2048);
        assert_eq!(value["isMedia"], true);
    }

    #[test]
    fn test_listing_without_parent() {
        let listing = DirectoryListing {
            parent: None,
            dirs: vec![],
            files: vec![],
        };

        let json = String::from_utf8(to_json(&listing).unwrap()).unwrap();
        assert_eq!(json, r#"{"dirs":[],"files":[]}"#);
    }

    #[test]
    fn test_status_reply_shapes() {
        let ok = String::from_utf8(to_json(&StatusReply::ok()).unwrap()).unwrap();
        assert_eq!(ok, r#"{"status":"ok"}"#);

        let err = String::from_utf8(to_json(&StatusReply::error("invalid params")).unwrap()).unwrap();
        assert_eq!(err, r#"{"status":"error","message":"invalid params"}"#);

        let unavailable = StatusReply::error("service not enabled").with_code(CODE_SERVICE_UNAVAILABLE);
        assert!(!unavailable.is_ok());
        assert_eq!(unavailable.code.as_deref(), Some("accessibility_not_enabled"));
    }

    #[test]
    fn test_mouse_status_field_names() {
        let status = MouseStatus {
            service_enabled: true,
            mouse_x: 960,
            mouse_y: 540,
            screen_width: 1920,
            screen_height: 1080,
            api_level: 30,
        };

        let value: serde_json::Value = serde_json::from_slice(&to_json(&status).unwrap()).unwrap();
        assert_eq!(value["serviceEnabled"], true);
        assert_eq!(value["mouseX"], 960);
        assert_eq!(value["screenHeight"], 1080);
        assert_eq!(value["apiLevel"], 30);
    }

    #[test]
    fn test_upload_reply_variants() {
        let json = String::from_utf8(to_json(&UploadReply::rejected("Invalid path")).unwrap()).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"Invalid path"}"#);

        let parsed: UploadReply = from_json(br#"{"success":true}"#).unwrap();
        assert_eq!(parsed, UploadReply::succeeded());
    }

    #[test]
    fn test_legacy_reply() {
        let json = String::from_utf8(to_json(&LegacyReply::removed()).unwrap()).unwrap();
        assert_eq!(json, r#"{"success":false,"message":"removed"}"#);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let result: Result<MouseMoved> = from_json(b"not json");
        assert!(result.is_err());
    }
}
