//! Post-processing file relocation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::PipelineError;
use crate::config::ProductConfig;
use crate::models::FileReference;

/// Moves a processed file out of its input directory, exactly once per
/// processing run.
#[async_trait]
pub trait FileMover: Send + Sync {
    async fn move_to_archive(&self, file: &FileReference) -> Result<(), PipelineError>;
    async fn move_to_failed(&self, file: &FileReference) -> Result<(), PipelineError>;
}

#[derive(Debug, Clone)]
struct ProductDirs {
    input: PathBuf,
    archive: PathBuf,
    fail: PathBuf,
}

/// Filesystem mover using each product's configured directories.
///
/// Destination directories are created on demand; an existing file with the
/// same name in the destination is overwritten, matching rename semantics.
pub struct LocalFileMover {
    dirs: HashMap<String, ProductDirs>,
}

impl LocalFileMover {
    pub fn new(products: &[ProductConfig]) -> Self {
        Self {
            dirs: products
                .iter()
                .map(|product| {
                    (
                        product.id.clone(),
                        ProductDirs {
                            input: product.input_dir.clone(),
                            archive: product.archive_dir.clone(),
                            fail: product.fail_dir.clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    fn dirs(&self, file: &FileReference) -> Result<&ProductDirs, PipelineError> {
        self.dirs
            .get(file.product_id())
            .ok_or_else(|| PipelineError::UnknownProduct {
                product_id: file.product_id().to_string(),
            })
    }

    async fn relocate(
        &self,
        file: &FileReference,
        source_dir: &Path,
        target_dir: &Path,
    ) -> Result<(), PipelineError> {
        let source = source_dir.join(file.filename());
        let target = target_dir.join(file.filename());
        tokio::fs::create_dir_all(target_dir).await?;
        tokio::fs::rename(&source, &target).await?;
        debug!(file = %file, target = %target.display(), "file relocated");
        Ok(())
    }
}

#[async_trait]
impl FileMover for LocalFileMover {
    async fn move_to_archive(&self, file: &FileReference) -> Result<(), PipelineError> {
        let dirs = self.dirs(file)?;
        self.relocate(file, &dirs.input, &dirs.archive).await
    }

    async fn move_to_failed(&self, file: &FileReference) -> Result<(), PipelineError> {
        let dirs = self.dirs(file)?;
        self.relocate(file, &dirs.input, &dirs.fail).await
    }
}
