//! 单文件处理：读 JSONL -> 分词 -> 过滤 -> 词表 id -> 词频统计 -> 写出两个 CSV。

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::filter::is_noise;
use crate::freq::FrequencyCounter;
use crate::log::{log_debug, log_warn, worker_tag};
use crate::output::{self, NEXT_WORD_FREQ_DIR, WORD_FREQ_DIR};
use crate::segment::Segmenter;
use crate::vocab::Vocabulary;

/// JSON 行解析失败时的处理方式
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MalformedLinePolicy {
    /// 记录警告并跳过该行
    #[default]
    Skip,
    /// 整个文件视为失败
    Fail,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub results_dir: PathBuf,
    pub on_malformed: MalformedLinePolicy,
    /// 每 N 篇文档打一条 debug 进度（0=关闭）
    pub progress_every: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            on_malformed: MalformedLinePolicy::Skip,
            progress_every: 0,
        }
    }
}

impl WorkerConfig {
    pub fn word_freq_path(&self, input: &Path) -> Result<PathBuf> {
        Ok(self
            .results_dir
            .join(WORD_FREQ_DIR)
            .join(output::output_file_name(input)?))
    }

    pub fn next_word_freq_path(&self, input: &Path) -> Result<PathBuf> {
        Ok(self
            .results_dir
            .join(NEXT_WORD_FREQ_DIR)
            .join(output::output_file_name(input)?))
    }
}

/// 一行 JSON 文档；`text` 缺失或为 null 时按空串处理
#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub documents: u64,
    pub sub_lines: u64,
    pub tokens: u64,
    pub distinct_unigrams: usize,
    pub distinct_bigrams: usize,
    pub skipped_lines: u64,
}

/// 对一篇文档的 text 做分词和计数。每个子行是一个独立的 run。
fn count_text(
    text: &str,
    vocab: &Vocabulary,
    segmenter: &dyn Segmenter,
    counter: &mut FrequencyCounter,
) -> Result<u64> {
    let sub_lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    let runs = segmenter.segment_batch(&sub_lines)?;
    if runs.len() != sub_lines.len() {
        bail!(
            "segmenter returned {} token runs for {} lines",
            runs.len(),
            sub_lines.len()
        );
    }

    for run in &runs {
        counter.start_new_run();
        let kept: Vec<&str> = run.iter().map(String::as_str).filter(|t| !is_noise(t)).collect();
        for id in vocab.resolve_run(&kept)? {
            counter.observe(id);
        }
    }
    Ok(sub_lines.len() as u64)
}

/// 处理一个输入文件。失败时不写出任何该文件的结果（词表中已分配的 id 保留）。
pub fn process_file(
    path: &Path,
    vocab: &Vocabulary,
    segmenter: &dyn Segmenter,
    cfg: &WorkerConfig,
) -> Result<FileReport> {
    let tag = worker_tag();
    let f = File::open(path).with_context(|| format!("open input failed: {path:?}"))?;
    let reader = BufReader::new(f);

    let mut counter = FrequencyCounter::new();
    let mut report = FileReport {
        path: path.to_path_buf(),
        ..FileReport::default()
    };

    for (i, line) in reader.lines().enumerate() {
        let lineno = i + 1;
        let line = line.with_context(|| format!("read input failed: {path:?}:{lineno}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let doc: Document = match serde_json::from_str(&line) {
            Ok(doc) => doc,
            Err(e) => match cfg.on_malformed {
                MalformedLinePolicy::Fail => {
                    return Err(e).with_context(|| format!("malformed json at {path:?}:{lineno}"));
                }
                MalformedLinePolicy::Skip => {
                    log_warn(&tag, format!("skip malformed json at {path:?}:{lineno}: {e}"));
                    report.skipped_lines += 1;
                    continue;
                }
            },
        };

        let text = doc.text.unwrap_or_default();
        report.sub_lines += count_text(&text, vocab, segmenter, &mut counter)
            .with_context(|| format!("segment failed at {path:?}:{lineno}"))?;
        report.documents += 1;

        if cfg.progress_every > 0 && report.documents % cfg.progress_every as u64 == 0 {
            log_debug(
                &tag,
                format!(
                    "{path:?} docs={} tokens={} vocab={}",
                    report.documents,
                    counter.total_tokens(),
                    vocab.len()
                ),
            );
        }
    }

    let uni_path = cfg.word_freq_path(path)?;
    let bi_path = cfg.next_word_freq_path(path)?;
    output::write_unigram_csv(&uni_path, &counter.sorted_unigrams())?;
    if let Err(e) = output::write_bigram_csv(&bi_path, &counter.sorted_bigrams()) {
        // 两个输出要么都在，要么都不在
        let _ = std::fs::remove_file(&uni_path);
        return Err(e);
    }

    report.tokens = counter.total_tokens();
    report.distinct_unigrams = counter.unigrams().len();
    report.distinct_bigrams = counter.bigrams().len();
    Ok(report)
}
