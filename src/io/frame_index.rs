//! Image file listings for the left, right and label streams.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Result, SessionError};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Left,
    Right,
    Label,
}

/// File paths belonging to one frame index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub index: usize,
    pub left_path: PathBuf,
    pub right_path: PathBuf,
    pub label_path: Option<PathBuf>,
}

/// Ordered image files of every stream.
///
/// Frame `i` is the `i`-th file of each stream in lexicographic filename
/// order. Matching names across streams is up to whoever produced the dataset.
#[derive(Debug, Clone, Default)]
pub struct FrameIndex {
    left: Vec<PathBuf>,
    right: Vec<PathBuf>,
    label: Option<Vec<PathBuf>>,
}

impl FrameIndex {
    /// A stream directory that cannot be listed gives an empty index. Two
    /// listed streams of different length are an error.
    pub fn build(left_dir: &Path, right_dir: &Path, label_dir: Option<&Path>) -> Result<Self> {
        for dir in [left_dir, right_dir] {
            if !dir.is_dir() {
                warn!("Image directory {:?} is not available; sequence has no frames", dir);
                return Ok(Self::default());
            }
        }

        let left = list_image_files(left_dir);
        let right = list_image_files(right_dir);
        if left.len() != right.len() {
            return Err(SessionError::StreamLengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }

        let label = label_dir.map(list_image_files);
        if let Some(labels) = &label {
            if labels.len() < left.len() {
                warn!(
                    "Label stream has {} images for {} frames; later frames have no label",
                    labels.len(),
                    left.len()
                );
            }
        }

        info!("The number of images found are {}", left.len());
        Ok(Self { left, right, label })
    }

    pub fn count(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn has_labels(&self) -> bool {
        self.label.is_some()
    }

    pub fn path_at(&self, idx: usize, stream: Stream) -> Option<&Path> {
        let files = match stream {
            Stream::Left => &self.left,
            Stream::Right => &self.right,
            Stream::Label => self.label.as_ref()?,
        };
        files.get(idx).map(PathBuf::as_path)
    }

    pub fn record(&self, idx: usize) -> Option<FrameRecord> {
        Some(FrameRecord {
            index: idx,
            left_path: self.path_at(idx, Stream::Left)?.to_path_buf(),
            right_path: self.path_at(idx, Stream::Right)?.to_path_buf(),
            label_path: self.path_at(idx, Stream::Label).map(Path::to_path_buf),
        })
    }
}

/// Image files of `dir` sorted by filename.
///
/// A missing or unreadable directory gives an empty list.
pub fn list_image_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list image directory {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"").unwrap();
        }
    }

    #[test]
    fn test_lists_images_in_lexicographic_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &["000010.png", "000002.png", "000001.jpg", "notes.txt", "000003.JPEG"],
        );

        let files = list_image_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["000001.jpg", "000002.png", "000003.JPEG", "000010.png"]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        assert!(list_image_files(Path::new("/nonexistent/image_2")).is_empty());
    }

    #[test]
    fn test_record_maps_index_to_all_streams() {
        let root = tempfile::tempdir().unwrap();
        let (left, right, label) = (
            root.path().join("left"),
            root.path().join("right"),
            root.path().join("label"),
        );
        for dir in [&left, &right, &label] {
            fs::create_dir(dir).unwrap();
        }
        touch(&left, &["a.png", "b.png"]);
        touch(&right, &["a.png", "b.png"]);
        touch(&label, &["a.png"]);

        let index = FrameIndex::build(&left, &right, Some(&label)).unwrap();
        assert_eq!(index.count(), 2);
        assert!(index.has_labels());

        let rec = index.record(1).unwrap();
        assert_eq!(rec.left_path, left.join("b.png"));
        assert_eq!(rec.right_path, right.join("b.png"));
        assert!(rec.label_path.is_none());
        assert_eq!(index.path_at(0, Stream::Label), Some(label.join("a.png").as_path()));
        assert!(index.record(2).is_none());
    }

    #[test]
    fn test_stream_length_mismatch() {
        let root = tempfile::tempdir().unwrap();
        let (left, right) = (root.path().join("l"), root.path().join("r"));
        fs::create_dir(&left).unwrap();
        fs::create_dir(&right).unwrap();
        touch(&left, &["0.png", "1.png"]);
        touch(&right, &["0.png"]);

        assert!(matches!(
            FrameIndex::build(&left, &right, None),
            Err(SessionError::StreamLengthMismatch { left: 2, right: 1 })
        ));
    }

    #[test]
    fn test_missing_right_directory_gives_no_frames() {
        let root = tempfile::tempdir().unwrap();
        let left = root.path().join("l");
        fs::create_dir(&left).unwrap();
        touch(&left, &["0.png"]);

        let index = FrameIndex::build(&left, &root.path().join("r"), None).unwrap();
        assert_eq!(index.count(), 0);
        assert!(index.is_empty());
        assert!(!index.has_labels());
    }
}
