//! Filesystem mailbox store: Maildir++ style trees and plain `.eml` folders.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use mail_parser::MessageParser;
use walkdir::WalkDir;

use super::error::MailboxError;
use super::store::{MailFolder, MailItem, MailItems, RawMessage};
use crate::sanitize::redact_path;

/// Maildir subdirectories that hold messages rather than child folders.
const MAILDIR_PARTS: &[&str] = &["cur", "new", "tmp"];

/// A directory in a filesystem mailbox.
///
/// Child directories are folders, as are Maildir++ `.Name` directories
/// holding `cur/` or `new/`. Other hidden entries are ignored. Messages are
/// `.eml` files in the directory itself plus every file in its `cur/` and
/// `new/` subdirectories. Files with other extensions surface as non-mail
/// items.
pub struct MaildirFolder {
    dir: PathBuf,
    path: String,
}

impl MaildirFolder {
    /// Opens `root` as the top of the folder tree.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, MailboxError> {
        let dir = root.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(MailboxError::InvalidRoot(dir));
        }
        let path = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());
        Ok(Self { dir, path })
    }

    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, MailboxError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| MailboxError::ListFolder {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            paths.push(entry.into_path());
        }
        Ok(paths)
    }

    fn message_files(&self) -> Result<Vec<(PathBuf, bool)>, MailboxError> {
        let mut files = Vec::new();
        for path in self.list(&self.dir)? {
            if path.is_file() && !is_hidden(&path) {
                let is_mail = has_extension(&path, "eml");
                files.push((path, is_mail));
            }
        }
        for part in ["cur", "new"] {
            let sub = self.dir.join(part);
            if sub.is_dir() {
                for path in self.list(&sub)? {
                    if path.is_file() && !is_hidden(&path) {
                        files.push((path, true));
                    }
                }
            }
        }
        Ok(files)
    }
}

impl MailFolder for MaildirFolder {
    fn path(&self) -> &str {
        &self.path
    }

    fn items(&self) -> Result<MailItems, MailboxError> {
        let files = self.message_files()?;
        debug!("{}: {} entries", redact_path(&self.dir), files.len());
        let folder_path = self.path.clone();
        Ok(Box::new(files.into_iter().map(move |(file, is_mail)| {
            if is_mail {
                read_message(&file, &folder_path).map(MailItem::Mail)
            } else {
                let kind = file
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .unwrap_or_else(|| "unknown".to_string());
                Ok(MailItem::Other { kind })
            }
        })))
    }

    fn subfolders(&self) -> Result<Vec<Box<dyn MailFolder>>, MailboxError> {
        let mut children: Vec<Box<dyn MailFolder>> = Vec::new();
        for path in self.list(&self.dir)? {
            if !path.is_dir() {
                continue;
            }
            let name = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            let name = match name.strip_prefix('.') {
                // Maildir++ subfolder, e.g. `.Sent`
                Some(stripped) if !stripped.is_empty() && is_maildir(&path) => {
                    stripped.to_string()
                }
                Some(_) => continue,
                None if MAILDIR_PARTS.contains(&name.as_str()) => continue,
                None => name,
            };
            children.push(Box::new(MaildirFolder {
                path: format!("{}/{}", self.path, name),
                dir: path,
            }));
        }
        Ok(children)
    }
}

fn read_message(file: &Path, folder_path: &str) -> Result<RawMessage, MailboxError> {
    let bytes = fs::read(file).map_err(|source| MailboxError::ReadItem {
        path: file.to_path_buf(),
        source,
    })?;

    let message = MessageParser::default()
        .parse(&bytes)
        .ok_or_else(|| MailboxError::Parse(file.to_path_buf()))?;

    let sender = message
        .from()
        .and_then(|addr| addr.first().map(format_sender))
        .unwrap_or_default();

    let sent_at = message
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0));

    let item_ref = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    Ok(RawMessage {
        sender,
        subject: message.subject().unwrap_or_default().to_string(),
        body: message
            .body_text(0)
            .map(|b| b.into_owned())
            .unwrap_or_default(),
        sent_at,
        received_at: received_time(file),
        folder_path: folder_path.to_string(),
        item_ref,
    })
}

/// Delivery time: the leading unix timestamp of a maildir file name, else
/// the file's modification time.
fn received_time(file: &Path) -> Option<DateTime<Utc>> {
    let from_name = file.file_name().and_then(|name| {
        let name = name.to_string_lossy();
        let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
        match name[digits.len()..].chars().next() {
            Some('.') if digits.len() >= 9 => digits.parse::<i64>().ok(),
            _ => None,
        }
    });

    if let Some(secs) = from_name {
        return DateTime::from_timestamp(secs, 0);
    }

    fs::metadata(file)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn format_sender(addr: &mail_parser::Addr) -> String {
    match (addr.name(), addr.address()) {
        (Some(name), Some(address)) => format!("{} <{}>", name, address),
        (None, Some(address)) => address.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => String::new(),
    }
}

fn is_maildir(dir: &Path) -> bool {
    dir.join("cur").is_dir() || dir.join("new").is_dir()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}
