//! Batch planning: map a folder of images to job requests.
//!
//! Prompts come from a [`PromptManifest`], a JSON object keyed by image
//! file name. Each image yields `videos_per_image` requests whose
//! destinations are `{output_dir}/{stem}_video_{n}.mp4`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::JobRequest;

/// Image extensions picked up by [`scan_images`] (compared lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Extension of generated artifacts.
pub const VIDEO_EXTENSION: &str = "mp4";

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Image file name to prompt mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptManifest {
    prompts: BTreeMap<String, String>,
}

impl PromptManifest {
    /// Read a manifest file.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| CoreError::json(path, e))
    }

    /// Write the manifest as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| CoreError::json(path, e))?;
        std::fs::write(path, json).map_err(|e| CoreError::io(path, e))
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Prompt for an image, looked up by its file name.
    ///
    /// Blank prompts count as missing.
    pub fn prompt_for(&self, image: &Path) -> Option<&str> {
        let file_name = image.file_name()?.to_str()?;
        self.prompts
            .get(file_name)
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
    }

    /// Insert or replace the prompt for an image (keyed by file name).
    pub fn set_prompt(&mut self, image: &Path, prompt: impl Into<String>) -> Result<(), CoreError> {
        let file_name = image
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                CoreError::Validation(format!("Image path has no file name: {}", image.display()))
            })?;
        self.prompts.insert(file_name.to_string(), prompt.into());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Image discovery
// ---------------------------------------------------------------------------

/// Whether `path` has one of the [`IMAGE_EXTENSIONS`].
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// List image files directly inside `dir`, sorted by path.
pub fn scan_images(dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
    if !dir.is_dir() {
        return Err(CoreError::Validation(format!(
            "Image folder is not a directory: {}",
            dir.display()
        )));
    }

    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| CoreError::io(dir, e))? {
        let path = entry.map_err(|e| CoreError::io(dir, e))?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Result of [`plan_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    pub requests: Vec<JobRequest>,
    /// Images that had no prompt in the manifest.
    pub skipped: Vec<PathBuf>,
}

/// Destination for the `index`-th (1-based) video generated from `image`.
pub fn output_path(output_dir: &Path, image: &Path, index: u32) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    output_dir.join(format!("{stem}_video_{index}.{VIDEO_EXTENSION}"))
}

/// Build one request per image and copy, in image order.
pub fn plan_batch(
    images: &[PathBuf],
    manifest: &PromptManifest,
    videos_per_image: u32,
    output_dir: &Path,
    model: &str,
) -> Result<BatchPlan, CoreError> {
    if videos_per_image == 0 {
        return Err(CoreError::Validation(
            "videos_per_image must be at least 1".to_string(),
        ));
    }

    let mut plan = BatchPlan::default();
    for image in images {
        let Some(prompt) = manifest.prompt_for(image) else {
            plan.skipped.push(image.clone());
            continue;
        };
        for index in 1..=videos_per_image {
            plan.requests.push(JobRequest::new(
                image.clone(),
                prompt,
                output_path(output_dir, image, index),
                model,
            ));
        }
    }
    Ok(plan)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn manifest(entries: &[(&str, &str)]) -> PromptManifest {
        let mut m = PromptManifest::default();
        for (image, prompt) in entries {
            m.set_prompt(Path::new(image), *prompt).unwrap();
        }
        m
    }

    #[test]
    fn prompt_lookup_uses_file_name_only() {
        let m = manifest(&[("cat.png", "a cat")]);
        assert_eq!(m.prompt_for(Path::new("/some/dir/cat.png")), Some("a cat"));
        assert_eq!(m.prompt_for(Path::new("dog.png")), None);
    }

    #[test]
    fn blank_prompt_counts_as_missing() {
        let m = manifest(&[("cat.png", "   ")]);
        assert_eq!(m.prompt_for(Path::new("cat.png")), None);
    }

    #[test]
    fn manifest_parses_flat_json_object() {
        let m: PromptManifest =
            serde_json::from_str(r#"{"a.jpg": "first", "b.png": "second"}"#).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.prompt_for(Path::new("b.png")), Some("second"));
    }

    #[test]
    fn manifest_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        let m = manifest(&[("cat.png", "a cat")]);
        m.save(&path).unwrap();
        assert_eq!(PromptManifest::load(&path).unwrap(), m);
    }

    #[test]
    fn image_extension_check_is_case_insensitive() {
        assert!(is_image(Path::new("a.PNG")));
        assert!(is_image(Path::new("a.jpeg")));
        assert!(!is_image(Path::new("a.gif")));
        assert!(!is_image(Path::new("noext")));
    }

    #[test]
    fn scan_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.png", "notes.txt", "c.JPEG"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let images = scan_images(dir.path()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg", "c.JPEG"]);
    }

    #[test]
    fn scan_images_rejects_missing_dir() {
        assert_matches!(
            scan_images(Path::new("/definitely/not/here")),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn output_path_numbers_from_one() {
        let p = output_path(Path::new("/out"), Path::new("/in/cat.png"), 2);
        assert_eq!(p, PathBuf::from("/out/cat_video_2.mp4"));
    }

    #[test]
    fn plan_expands_copies_and_skips_unprompted() {
        let images = vec![PathBuf::from("/in/cat.png"), PathBuf::from("/in/dog.png")];
        let m = manifest(&[("cat.png", "a cat")]);

        let plan = plan_batch(&images, &m, 2, Path::new("/out"), "I2V-01").unwrap();

        assert_eq!(plan.skipped, vec![PathBuf::from("/in/dog.png")]);
        assert_eq!(plan.requests.len(), 2);
        assert_eq!(plan.requests[0].destination, PathBuf::from("/out/cat_video_1.mp4"));
        assert_eq!(plan.requests[1].destination, PathBuf::from("/out/cat_video_2.mp4"));
        assert!(plan.requests.iter().all(|r| r.prompt == "a cat" && r.model == "I2V-01"));
    }

    #[test]
    fn plan_rejects_zero_copies() {
        assert_matches!(
            plan_batch(&[], &PromptManifest::default(), 0, Path::new("/out"), "m"),
            Err(CoreError::Validation(_))
        );
    }
}
