//! Artifact naming conventions shared with the capture collaborators and
//! the transport.
//!
//! Sealed artifacts follow `<TYPE>_<session_id>_<seq_index>.<ext>`;
//! in-progress capture files carry a `temp_` prefix so scanners skip them.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::models::queue_item::FileType;

/// Prefix on files the capture side is still writing.
pub const TEMP_PREFIX: &str = "temp_";

/// Remote folder an artifact lands in, derived from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CloudFolder {
    AudioRaw,
    PhysicalLogs,
    NotificationLogs,
    ScreenLogs,
    UnknownLogs,
}

impl CloudFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudFolder::AudioRaw => "audio_raw",
            CloudFolder::PhysicalLogs => "physical_logs",
            CloudFolder::NotificationLogs => "notification_logs",
            CloudFolder::ScreenLogs => "screen_logs",
            CloudFolder::UnknownLogs => "unknown_logs",
        }
    }
}

fn type_tag(file_type: FileType) -> &'static str {
    match file_type {
        FileType::PhysLog => "PHYSICAL",
        FileType::ScreenLog => "SCREEN",
        FileType::Audio => "AUDIO",
    }
}

fn extension(file_type: FileType) -> &'static str {
    match file_type {
        FileType::PhysLog | FileType::ScreenLog => "jsonl",
        FileType::Audio => "m4a",
    }
}

/// `<TYPE>_<session_id>_<seq_index>.<ext>` for a sealed artifact.
pub fn artifact_file_name(file_type: FileType, session_id: &str, seq_index: u32) -> String {
    format!(
        "{}_{}_{}.{}",
        type_tag(file_type),
        session_id,
        seq_index,
        extension(file_type)
    )
}

/// Expected on-disk location of a sealed artifact.
pub fn artifact_path(
    output_directory: &Path,
    file_type: FileType,
    session_id: &str,
    seq_index: u32,
) -> PathBuf {
    output_directory.join(artifact_file_name(file_type, session_id, seq_index))
}

/// Whether a file name belongs to an in-progress capture file.
pub fn is_in_progress(file_name: &str) -> bool {
    file_name.starts_with(TEMP_PREFIX)
}

/// Remote folder mapping consumed by the transport collaborator.
pub fn cloud_folder_for(file_name: &str) -> CloudFolder {
    if file_name.ends_with(".m4a") {
        CloudFolder::AudioRaw
    } else if file_name.contains("PHYSICAL") {
        CloudFolder::PhysicalLogs
    } else if file_name.contains("NOTIFS") {
        CloudFolder::NotificationLogs
    } else if file_name.contains("SCREEN") {
        CloudFolder::ScreenLogs
    } else {
        CloudFolder::UnknownLogs
    }
}
