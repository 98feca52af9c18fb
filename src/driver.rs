//! 语料驱动：枚举输入文件，rayon 线程池并行处理，结束后写出全局词表。

use anyhow::{bail, Context, Result};
use hashbrown::HashMap;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::log::{log_info, log_warn, worker_tag};
use crate::output::{self, NEXT_WORD_FREQ_DIR, VOCAB_FILE, WORD_FREQ_DIR};
use crate::segment::Segmenter;
use crate::vocab::Vocabulary;
use crate::worker::{process_file, FileReport, MalformedLinePolicy, WorkerConfig};

#[derive(Debug, Clone)]
pub struct CorpusConfig {
    pub input_dir: PathBuf,
    pub results_dir: PathBuf,
    /// 只处理文件名以此结尾的文件
    pub suffix: String,
    pub recursive: bool,
    /// 线程数（0 = CPU 核数）
    pub num_workers: usize,
    pub on_malformed: MalformedLinePolicy,
    /// 相对 results_dir 的词表文件名
    pub vocab_file: String,
    pub progress_every: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            results_dir: PathBuf::from("results"),
            suffix: ".jsonl".to_string(),
            recursive: false,
            num_workers: 8,
            on_malformed: MalformedLinePolicy::Skip,
            vocab_file: VOCAB_FILE.to_string(),
            progress_every: 0,
        }
    }
}

impl CorpusConfig {
    pub fn vocab_path(&self) -> PathBuf {
        self.results_dir.join(&self.vocab_file)
    }

    fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            results_dir: self.results_dir.clone(),
            on_malformed: self.on_malformed,
            progress_every: self.progress_every,
        }
    }
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: anyhow::Error,
}

#[derive(Debug, Default)]
pub struct CorpusReport {
    pub files: Vec<FileReport>,
    pub failures: Vec<FileFailure>,
    pub vocab_size: usize,
}

impl CorpusReport {
    pub fn total_files(&self) -> usize {
        self.files.len() + self.failures.len()
    }

    /// 有任一文件失败时返回汇总错误
    pub fn ensure_success(&self) -> Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        let listed: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{:?}: {:#}", f.path, f.error))
            .collect();
        bail!(
            "{} of {} files failed:\n  {}",
            self.failures.len(),
            self.total_files(),
            listed.join("\n  ")
        )
    }
}

/// 收集 `root` 下文件名以 `suffix` 结尾的文件，排序后返回
pub fn collect_input_files(root: &Path, suffix: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    fn walk(dir: &Path, suffix: &str, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
        for ent in fs::read_dir(dir).with_context(|| format!("read_dir failed: {dir:?}"))? {
            let ent = ent?;
            let path = ent.path();
            if path.is_dir() {
                if recursive {
                    walk(&path, suffix, true, out)?;
                }
                continue;
            }
            if path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.ends_with(suffix))
                .unwrap_or(false)
            {
                out.push(path);
            }
        }
        Ok(())
    }

    if !root.is_dir() {
        bail!("input dir not found: {root:?}");
    }
    let mut files: Vec<PathBuf> = Vec::new();
    walk(root, suffix, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

/// 输出文件名只取输入的文件名；递归扫描时不同子目录下的同名文件会写到同一个 CSV，
/// 因此在开始处理前直接报错。
pub fn ensure_unique_output_names(files: &[PathBuf]) -> Result<()> {
    let mut seen: HashMap<String, &Path> = HashMap::with_capacity(files.len());
    for p in files {
        let name = output::output_file_name(p)?;
        if let Some(first) = seen.insert(name.clone(), p.as_path()) {
            bail!("input files {first:?} and {p:?} would both write results/*/{name}; rename one of them");
        }
    }
    Ok(())
}

/// 跑完整个语料。单个文件失败不影响其它文件，结果记录在 [`CorpusReport::failures`]。
pub fn run_corpus(cfg: &CorpusConfig, segmenter: &dyn Segmenter) -> Result<CorpusReport> {
    let start = Instant::now();
    let files = collect_input_files(&cfg.input_dir, &cfg.suffix, cfg.recursive)?;
    ensure_unique_output_names(&files)?;
    if files.is_empty() {
        log_warn(
            "driver",
            format!("no *{} files under {:?}", cfg.suffix, cfg.input_dir),
        );
    }

    for sub in [WORD_FREQ_DIR, NEXT_WORD_FREQ_DIR] {
        let dir = cfg.results_dir.join(sub);
        fs::create_dir_all(&dir).with_context(|| format!("create dir failed: {dir:?}"))?;
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(cfg.num_workers)
        .build()
        .context("build rayon thread pool failed")?;
    log_info(
        "driver",
        format!(
            "start input={:?} files={} results={:?} workers={}",
            cfg.input_dir,
            files.len(),
            cfg.results_dir,
            pool.current_num_threads()
        ),
    );

    let vocab = Vocabulary::new();
    let wcfg = cfg.worker_config();
    let outcomes: Vec<(PathBuf, Result<FileReport>)> = pool.install(|| {
        files
            .par_iter()
            .map(|p| {
                let res = process_file(p, &vocab, segmenter, &wcfg);
                match &res {
                    Ok(r) => log_info(
                        &worker_tag(),
                        format!(
                            "done {:?} docs={} tokens={} skipped={}",
                            p, r.documents, r.tokens, r.skipped_lines
                        ),
                    ),
                    Err(e) => log_warn(&worker_tag(), format!("failed {p:?}: {e:#}")),
                }
                (p.clone(), res)
            })
            .collect()
    });

    let mut report = CorpusReport::default();
    for (path, res) in outcomes {
        match res {
            Ok(r) => report.files.push(r),
            Err(error) => report.failures.push(FileFailure { path, error }),
        }
    }

    let entries = vocab.export();
    report.vocab_size = entries.len();
    let vocab_path = cfg.vocab_path();
    output::write_vocab_csv(&vocab_path, &entries)?;

    log_info(
        "driver",
        format!(
            "finished ok={} failed={} vocab={} -> {:?} elapsed={:.2}s",
            report.files.len(),
            report.failures.len(),
            report.vocab_size,
            vocab_path,
            start.elapsed().as_secs_f32()
        ),
    );
    Ok(report)
}
