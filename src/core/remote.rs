use crate::config::cli::LocalStorage;
use crate::domain::model::FileEntry;
use crate::domain::ports::{RepositorySource, Storage};
use crate::utils::error::Result;
use std::path::{Component, Path};

/// Lists (and optionally downloads) one folder of a remote repository.
pub struct RemoteFileLister<'a, R: RepositorySource> {
    source: &'a R,
}

impl<'a, R: RepositorySource> RemoteFileLister<'a, R> {
    pub fn new(source: &'a R) -> Self {
        Self { source }
    }

    /// Immediate contents of `folder_path` at `branch`, downloading every file entry into
    /// `download_dir` when one is given.
    ///
    /// Any failure is logged and yields an empty listing.
    pub async fn list_files(
        &self,
        folder_path: &str,
        branch: &str,
        download_dir: Option<&str>,
    ) -> Vec<FileEntry> {
        match self.try_list_files(folder_path, branch, download_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(
                    "Error listing '{}' at branch '{}': {} ({})",
                    folder_path,
                    branch,
                    e,
                    e.recovery_suggestion()
                );
                Vec::new()
            }
        }
    }

    pub async fn try_list_files(
        &self,
        folder_path: &str,
        branch: &str,
        download_dir: Option<&str>,
    ) -> Result<Vec<FileEntry>> {
        let entries = self.source.list_directory(folder_path, branch).await?;

        if let Some(dir) = download_dir {
            let downloaded = self.download(&entries, branch, dir).await?;
            tracing::info!(
                "Folder '{}' downloaded to '{}' ({} files)",
                folder_path,
                dir,
                downloaded
            );
        }

        Ok(entries)
    }

    async fn download(&self, entries: &[FileEntry], branch: &str, dir: &str) -> Result<usize> {
        tokio::fs::create_dir_all(dir).await?;
        let storage = LocalStorage::new(dir.to_string());

        let mut downloaded = 0;
        for entry in entries.iter().filter(|e| e.is_file()) {
            if !is_plain_file_name(&entry.name) {
                tracing::warn!(
                    "Skipping download of {}: '{}' is not a plain file name",
                    entry.path,
                    entry.name
                );
                continue;
            }
            let bytes = self.source.fetch_file(&entry.path, branch).await?;
            storage.write_file(&entry.name, &bytes).await?;
            tracing::debug!("Downloaded {} ({} bytes)", entry.path, bytes.len());
            downloaded += 1;
        }
        Ok(downloaded)
    }

    /// Direct-fetch URL of `path` without re-listing.
    pub fn raw_url(&self, branch: &str, path: &str) -> String {
        format!(
            "{}/{}",
            self.source.raw_base_url(branch),
            path.trim_start_matches('/')
        )
    }
}

/// A single path component, so joining it onto the download directory stays inside it.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(&['/', '\\'][..])
}
