//! Scenario Store: labeled image corpus with a fixed train/test partition.
//!
//! Layout on disk:
//!
//! ```text
//! <root>/images/<stem>.{jpg,jpeg,png}
//! <root>/descriptions/<stem>.json
//! ```
//!
//! The partition is computed once at [`ScenarioStore::open`] from a seeded
//! shuffle of the sorted file list, so the same seed always yields the same
//! train/test membership and no image is in both. Per-run sampling happens on
//! a separate [`RuntimeBatch`] and never touches the partition.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::domain::scenario::DescriptionRecord;
use crate::domain::{BenchError, FewShotExample, Result, Scenario};

/// Recognized image extensions (case-insensitive).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Goal used when a description does not carry one.
pub const DEFAULT_GOAL: &str = "Drive safely.";

/// Minimum size of the training pool drawn for a run.
pub const MIN_TRAIN_POOL: usize = 20;

/// How the shuffled file list is cut into train and test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SplitPolicy {
    /// The first `n` shuffled files are train, the rest test.
    TrainCount(usize),
    /// The first `floor(len * ratio)` shuffled files are train.
    TrainRatio(f64),
}

impl Default for SplitPolicy {
    fn default() -> Self {
        SplitPolicy::TrainCount(125)
    }
}

impl SplitPolicy {
    fn cut(self, len: usize) -> usize {
        match self {
            SplitPolicy::TrainCount(n) => n.min(len),
            SplitPolicy::TrainRatio(ratio) => {
                let ratio = ratio.clamp(0.0, 1.0);
                ((len as f64) * ratio).floor() as usize
            }
        }
    }
}

/// Labeled corpus with its immutable train/test partition.
#[derive(Debug, Clone)]
pub struct ScenarioStore {
    root: PathBuf,
    images_dir: PathBuf,
    descriptions_dir: PathBuf,
    seed: u64,
    train: Vec<String>,
    test: Vec<String>,
}

impl ScenarioStore {
    /// Scan `root` and partition with the default split policy.
    pub fn open(root: impl AsRef<Path>, seed: u64) -> Result<Self> {
        Self::open_with_split(root, seed, SplitPolicy::default())
    }

    /// Scan `root` and partition with an explicit split policy.
    ///
    /// Fails with [`BenchError::DatasetNotFound`] when `images/` is missing
    /// or holds no recognized image files.
    pub fn open_with_split(root: impl AsRef<Path>, seed: u64, split: SplitPolicy) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let images_dir = root.join("images");
        let descriptions_dir = root.join("descriptions");

        if !images_dir.is_dir() {
            return Err(BenchError::DatasetNotFound {
                path: images_dir,
                reason: "images directory is absent".to_string(),
            });
        }

        let mut files = scan_images(&images_dir)?;
        if files.is_empty() {
            return Err(BenchError::DatasetNotFound {
                path: images_dir,
                reason: "no image files found".to_string(),
            });
        }

        files.sort();
        let mut rng = StdRng::seed_from_u64(seed);
        files.shuffle(&mut rng);

        let cut = split.cut(files.len());
        let test = files.split_off(cut);
        let train = files;

        info!(
            root = %root.display(),
            seed = seed,
            train = train.len(),
            test = test.len(),
            "dataset partitioned"
        );

        Ok(Self {
            root,
            images_dir,
            descriptions_dir,
            seed,
            train,
            test,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train partition, in shuffled order.
    pub fn train(&self) -> &[String] {
        &self.train
    }

    /// Test partition, in shuffled order.
    pub fn test(&self) -> &[String] {
        &self.test
    }

    /// SHA-256 over the partition membership, for comparing runs.
    pub fn partition_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for name in &self.train {
            hasher.update(b"train:");
            hasher.update(name.as_bytes());
            hasher.update(b"\n");
        }
        for name in &self.test {
            hasher.update(b"test:");
            hasher.update(name.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    /// Select the test sample and training pool for one run.
    ///
    /// * `test_limit = None`, or a limit at least the test size: the whole
    ///   test partition in a random order.
    /// * Otherwise exactly `test_limit` items drawn without replacement.
    ///
    /// `sampling_seed = None` draws fresh randomness each call. The training
    /// pool is the first `max(20, 2 * limit)` train items (capped by the
    /// partition) and does not depend on the seed.
    pub fn prepare_runtime_batch(
        &self,
        test_limit: Option<usize>,
        sampling_seed: Option<u64>,
    ) -> RuntimeBatch {
        let mut rng = match sampling_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let test = match test_limit {
            Some(limit) if limit < self.test.len() => self
                .test
                .choose_multiple(&mut rng, limit)
                .cloned()
                .collect(),
            _ => {
                let mut all = self.test.clone();
                all.shuffle(&mut rng);
                all
            }
        };

        let effective_limit = test_limit.unwrap_or(self.test.len());
        let pool_size = MIN_TRAIN_POOL
            .max(effective_limit.saturating_mul(2))
            .min(self.train.len());
        let train_pool = self.train[..pool_size].to_vec();

        match sampling_seed {
            Some(seed) => info!(seed = seed, test = test.len(), train_pool = pool_size, "runtime batch prepared (seeded)"),
            None => info!(test = test.len(), train_pool = pool_size, "runtime batch prepared (fresh draw)"),
        }

        RuntimeBatch {
            images_dir: self.images_dir.clone(),
            descriptions_dir: self.descriptions_dir.clone(),
            test,
            train_pool,
        }
    }
}

/// Per-run selection drawn from a [`ScenarioStore`] partition.
#[derive(Debug, Clone)]
pub struct RuntimeBatch {
    images_dir: PathBuf,
    descriptions_dir: PathBuf,
    test: Vec<String>,
    train_pool: Vec<String>,
}

impl RuntimeBatch {
    /// Image file names of the active test sample, in dispatch order.
    pub fn test_files(&self) -> &[String] {
        &self.test
    }

    /// Image file names of the training pool.
    pub fn train_pool(&self) -> &[String] {
        &self.train_pool
    }

    /// Draw up to `k` examples from the training pool without replacement.
    ///
    /// Pool entries without a readable description are skipped, so fewer
    /// than `k` examples may come back.
    pub fn sample_few_shot_examples<R: Rng + ?Sized>(
        &self,
        k: usize,
        rng: &mut R,
    ) -> Vec<FewShotExample> {
        self.train_pool
            .choose_multiple(rng, k)
            .filter_map(|name| {
                let record = read_description(&self.descriptions_dir, name)?;
                Some(FewShotExample {
                    context: record.context.unwrap_or_default(),
                    response: record.truth,
                })
            })
            .collect()
    }

    /// Resolve the test sample into fully loaded scenarios.
    ///
    /// A missing or unreadable description yields an empty ground truth
    /// rather than failing the batch.
    pub fn materialize_test_batch(&self) -> Vec<Scenario> {
        self.test
            .iter()
            .map(|name| {
                let record = read_description(&self.descriptions_dir, name).unwrap_or_default();
                Scenario {
                    id: record.id.unwrap_or_else(|| file_stem(name)),
                    image_reference: self.images_dir.join(name),
                    context: record.context.unwrap_or_default(),
                    goal: record.goal.unwrap_or_else(|| DEFAULT_GOAL.to_string()),
                    ground_truth: record.truth,
                }
            })
            .collect()
    }
}

fn scan_images(images_dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(images_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        if is_image(&name) {
            files.push(name);
        }
    }
    Ok(files)
}

fn is_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| e.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string()
}

fn read_description(descriptions_dir: &Path, image_name: &str) -> Option<DescriptionRecord> {
    let path = descriptions_dir.join(format!("{}.json", file_stem(image_name)));
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "description unavailable");
            return None;
        }
    };
    match serde_json::from_str::<DescriptionRecord>(&content) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed description record");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn write_dataset(count: usize, with_descriptions: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let images = dir.path().join("images");
        let descriptions = dir.path().join("descriptions");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&descriptions).unwrap();
        for i in 0..count {
            std::fs::write(images.join(format!("{:04}.jpg", i)), b"jpeg").unwrap();
            if with_descriptions {
                let record = serde_json::json!({
                    "context": format!("scene {}", i),
                    "perception": format!("perception {}", i),
                    "prediction": "cars continue",
                    "planning": "Proceed with caution.",
                });
                std::fs::write(
                    descriptions.join(format!("{:04}.json", i)),
                    record.to_string(),
                )
                .unwrap();
            }
        }
        dir
    }

    #[test]
    fn test_missing_images_dir_is_dataset_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScenarioStore::open(dir.path(), 42).unwrap_err();
        assert!(matches!(err, BenchError::DatasetNotFound { .. }));
    }

    #[test]
    fn test_empty_images_dir_is_dataset_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/readme.txt"), b"not an image").unwrap();
        let err = ScenarioStore::open(dir.path(), 42).unwrap_err();
        assert!(matches!(err, BenchError::DatasetNotFound { .. }));
    }

    #[test]
    fn test_partition_is_deterministic_for_seed() {
        let dir = write_dataset(30, false);
        let split = SplitPolicy::TrainCount(20);
        let a = ScenarioStore::open_with_split(dir.path(), 7, split).unwrap();
        let b = ScenarioStore::open_with_split(dir.path(), 7, split).unwrap();
        assert_eq!(a.train(), b.train());
        assert_eq!(a.test(), b.test());
        assert_eq!(a.partition_digest(), b.partition_digest());
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let dir = write_dataset(30, false);
        let store =
            ScenarioStore::open_with_split(dir.path(), 42, SplitPolicy::TrainCount(20)).unwrap();
        let train: HashSet<_> = store.train().iter().collect();
        let test: HashSet<_> = store.test().iter().collect();
        assert_eq!(train.len(), 20);
        assert_eq!(test.len(), 10);
        assert!(train.is_disjoint(&test));
        assert_eq!(train.union(&test).count(), 30);
    }

    #[test]
    fn test_default_split_keeps_everything_in_train_for_small_corpus() {
        let dir = write_dataset(10, false);
        let store = ScenarioStore::open(dir.path(), 42).unwrap();
        assert_eq!(store.train().len(), 10);
        assert!(store.test().is_empty());
    }

    #[test]
    fn test_ratio_split() {
        let dir = write_dataset(10, false);
        let store =
            ScenarioStore::open_with_split(dir.path(), 42, SplitPolicy::TrainRatio(0.8)).unwrap();
        assert_eq!(store.train().len(), 8);
        assert_eq!(store.test().len(), 2);
    }

    #[test]
    fn test_runtime_batch_respects_limit() {
        let dir = write_dataset(40, false);
        let store =
            ScenarioStore::open_with_split(dir.path(), 42, SplitPolicy::TrainCount(30)).unwrap();

        let batch = store.prepare_runtime_batch(Some(4), None);
        assert_eq!(batch.test_files().len(), 4);
        let test: HashSet<_> = store.test().iter().collect();
        assert!(batch.test_files().iter().all(|f| test.contains(f)));

        let over = store.prepare_runtime_batch(Some(500), None);
        assert_eq!(over.test_files().len(), 10);

        let zero = store.prepare_runtime_batch(Some(0), None);
        assert!(zero.test_files().is_empty());
    }

    #[test]
    fn test_unset_limit_yields_full_test_partition() {
        let dir = write_dataset(40, false);
        let store =
            ScenarioStore::open_with_split(dir.path(), 42, SplitPolicy::TrainCount(30)).unwrap();
        let batch = store.prepare_runtime_batch(None, Some(1));
        let mut got = batch.test_files().to_vec();
        let mut expected = store.test().to_vec();
        got.sort();
        expected.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let dir = write_dataset(60, false);
        let store =
            ScenarioStore::open_with_split(dir.path(), 42, SplitPolicy::TrainCount(30)).unwrap();
        let a = store.prepare_runtime_batch(Some(5), Some(123));
        let b = store.prepare_runtime_batch(Some(5), Some(123));
        assert_eq!(a.test_files(), b.test_files());
    }

    #[test]
    fn test_train_pool_size_and_prefix() {
        let dir = write_dataset(100, false);
        let store =
            ScenarioStore::open_with_split(dir.path(), 42, SplitPolicy::TrainCount(60)).unwrap();

        let small = store.prepare_runtime_batch(Some(3), None);
        assert_eq!(small.train_pool().len(), 20);
        assert_eq!(small.train_pool(), &store.train()[..20]);

        let large = store.prepare_runtime_batch(Some(15), None);
        assert_eq!(large.train_pool().len(), 30);

        let full = store.prepare_runtime_batch(None, None);
        assert_eq!(full.train_pool().len(), 60);
    }

    #[test]
    fn test_few_shot_examples_bounded_by_pool() {
        let dir = write_dataset(25, true);
        let store =
            ScenarioStore::open_with_split(dir.path(), 42, SplitPolicy::TrainCount(3)).unwrap();
        let batch = store.prepare_runtime_batch(Some(2), Some(9));
        let mut rng = StdRng::seed_from_u64(5);

        let examples = batch.sample_few_shot_examples(5, &mut rng);
        assert_eq!(examples.len(), 3);
        assert!(examples
            .iter()
            .all(|e| e.response.planning == "Proceed with caution."));
        assert!(examples.iter().all(|e| e.context.starts_with("scene ")));
    }

    #[test]
    fn test_materialize_missing_description_yields_empty_truth() {
        let dir = write_dataset(3, false);
        let store =
            ScenarioStore::open_with_split(dir.path(), 42, SplitPolicy::TrainCount(1)).unwrap();
        let scenarios = store.prepare_runtime_batch(None, Some(1)).materialize_test_batch();

        assert_eq!(scenarios.len(), 2);
        for scenario in &scenarios {
            assert!(scenario.ground_truth.is_blank());
            assert_eq!(scenario.goal, DEFAULT_GOAL);
            assert!(scenario.image_reference.ends_with(format!("{}.jpg", scenario.id)));
        }
    }

    #[test]
    fn test_materialize_reads_description_fields() {
        let dir = write_dataset(2, true);
        let store =
            ScenarioStore::open_with_split(dir.path(), 42, SplitPolicy::TrainCount(0)).unwrap();
        let scenarios = store.prepare_runtime_batch(None, Some(3)).materialize_test_batch();

        assert_eq!(scenarios.len(), 2);
        for scenario in &scenarios {
            assert_eq!(scenario.context, format!("scene {}", scenario.id.parse::<usize>().unwrap()));
            assert_eq!(scenario.ground_truth.prediction, "cars continue");
        }
    }

    #[test]
    fn test_numeric_id_description_keeps_ground_truth() {
        let dir = write_dataset(1, false);
        let record = serde_json::json!({
            "id": 7,
            "context": "Urban",
            "perception": "Red light.",
            "planning": "Stop.",
        });
        std::fs::write(
            dir.path().join("descriptions/0000.json"),
            record.to_string(),
        )
        .unwrap();

        let store =
            ScenarioStore::open_with_split(dir.path(), 42, SplitPolicy::TrainCount(0)).unwrap();
        let scenarios = store.prepare_runtime_batch(None, Some(1)).materialize_test_batch();

        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].id, "7");
        assert_eq!(scenarios[0].context, "Urban");
        assert_eq!(scenarios[0].ground_truth.planning, "Stop.");
        assert_eq!(scenarios[0].ground_truth.perception, "Red light.");
    }

    #[test]
    fn test_is_image_extension_matching() {
        assert!(is_image("a.JPG"));
        assert!(is_image("b.jpeg"));
        assert!(is_image("c.png"));
        assert!(!is_image("d.gif"));
        assert!(!is_image("noext"));
    }
}
