use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures_util::{Stream, TryStreamExt};
use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub(crate) const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

pub(crate) const ALLOWED_FILE_TYPES: [&str; 8] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "text/plain",
];

#[derive(Debug, thiserror::Error)]
pub(crate) enum UploadError {
    #[error(
        "Invalid file type. Only PDF, DOC, DOCX, JPG, JPEG, PNG, GIF, and TXT files are allowed."
    )]
    DisallowedType(String),
    #[error("File too large. Maximum size is 50MB.")]
    TooLarge,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub(crate) fn check_file_type(content_type: &str) -> Result<(), UploadError> {
    if ALLOWED_FILE_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(UploadError::DisallowedType(content_type.to_string()))
    }
}

/// Flat-directory store for uploaded materials. Records hold only the
/// generated file name; resolving it against the configured root happens
/// here, so nothing on disk or in the database carries an absolute path.
pub(crate) struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Name scheme inherited from the original uploader:
    /// `{field}-{timestamp}-{random}{ext}`.
    pub(crate) fn generate_name(field: &str, original_name: &str) -> String {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let random = rand::thread_rng().gen_range(0..1_000_000_000_u32);
        let extension = Path::new(original_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        format!("{field}-{timestamp}-{random}{extension}")
    }

    pub(crate) fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Streams `source` into `name`, enforcing the size cap chunk by chunk.
    /// A partial file is removed before the cap error is returned, so a
    /// rejected upload leaves nothing behind.
    pub(crate) async fn save<S, B, E>(&self, name: &str, source: &mut S) -> Result<i64, UploadError>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut file = fs::File::create(self.path(name)).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = source
            .try_next()
            .await
            .map_err(|err| std::io::Error::new(ErrorKind::Other, err))?
        {
            written += chunk.as_ref().len() as u64;
            if written > MAX_FILE_SIZE {
                drop(file);
                self.remove(name).await?;
                return Err(UploadError::TooLarge);
            }
            file.write_all(chunk.as_ref()).await?;
        }
        file.flush().await?;
        Ok(written as i64)
    }

    pub(crate) async fn open(&self, name: &str) -> std::io::Result<fs::File> {
        fs::File::open(self.path(name)).await
    }

    /// A file that is already gone is not an error; record deletion must
    /// proceed regardless.
    pub(crate) async fn remove(&self, name: &str) -> std::io::Result<()> {
        match fs::remove_file(self.path(name)).await {
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Unpin {
        stream::iter(parts.into_iter().map(Ok))
    }

    #[test]
    fn generated_names_follow_the_multer_scheme() {
        let pattern = regex::Regex::new(r"^file-\d+-\d+\.pdf$").unwrap();
        let name = FileStore::generate_name("file", "signals and systems.pdf");
        assert!(pattern.is_match(&name), "unexpected name {name}");

        let bare = FileStore::generate_name("file", "README");
        assert!(regex::Regex::new(r"^file-\d+-\d+$").unwrap().is_match(&bare));
    }

    #[test]
    fn allow_list_is_exact() {
        assert!(check_file_type("application/pdf").is_ok());
        assert!(check_file_type("text/plain").is_ok());
        assert!(matches!(
            check_file_type("application/zip"),
            Err(UploadError::DisallowedType(_))
        ));
        assert!(matches!(
            check_file_type("application/PDF"),
            Err(UploadError::DisallowedType(_))
        ));
    }

    #[tokio::test]
    async fn save_writes_and_reports_the_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let mut source = chunks(vec![b"hello ".to_vec(), b"world".to_vec()]);
        let size = store.save("file-1-1.txt", &mut source).await.unwrap();
        assert_eq!(size, 11);
        let body = std::fs::read(store.path("file-1-1.txt")).unwrap();
        assert_eq!(body, b"hello world");
    }

    #[tokio::test]
    async fn oversized_upload_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let half = vec![0_u8; (MAX_FILE_SIZE / 2 + 1) as usize];
        let mut source = chunks(vec![half.clone(), half]);
        let res = store.save("file-1-2.bin", &mut source).await;
        assert!(matches!(res, Err(UploadError::TooLarge)));
        assert!(!store.path("file-1-2.bin").exists());
    }

    #[tokio::test]
    async fn removing_a_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.remove("file-does-not-exist.pdf").await.unwrap();
    }
}
