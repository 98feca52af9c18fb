//! End-to-end tests for the corpus driver: output content, failure isolation and
//! consistency of the shared vocabulary under parallel workers.

use anyhow::{anyhow, Result};
use corpus_vocab::output::{read_bigram_csv, read_unigram_csv, read_vocab_csv};
use corpus_vocab::{
    run_corpus, CorpusConfig, CorpusReport, MalformedLinePolicy, Segmenter, WhitespaceSegmenter,
};
use hashbrown::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Segmenter backed by a fixed line -> tokens table; unknown lines are an error.
struct TableSegmenter {
    table: HashMap<String, Vec<String>>,
}

impl TableSegmenter {
    fn new(rows: &[(&str, &[&str])]) -> Self {
        let table = rows
            .iter()
            .map(|(line, toks)| {
                let toks: Vec<String> = toks.iter().map(|t| t.to_string()).collect();
                (line.to_string(), toks)
            })
            .collect();
        Self { table }
    }
}

impl Segmenter for TableSegmenter {
    fn segment_batch(&self, lines: &[&str]) -> Result<Vec<Vec<String>>> {
        lines
            .iter()
            .map(|l| {
                self.table
                    .get(*l)
                    .cloned()
                    .ok_or_else(|| anyhow!("no segmentation for {l:?}"))
            })
            .collect()
    }
}

/// Whitespace segmentation, but fails on any line containing `坏`.
struct FailingSegmenter;

impl Segmenter for FailingSegmenter {
    fn segment_batch(&self, lines: &[&str]) -> Result<Vec<Vec<String>>> {
        if lines.iter().any(|l| l.contains('坏')) {
            return Err(anyhow!("segmenter crashed"));
        }
        WhitespaceSegmenter.segment_batch(lines)
    }
}

/// Returns one run fewer than requested.
struct ShortSegmenter;

impl Segmenter for ShortSegmenter {
    fn segment_batch(&self, lines: &[&str]) -> Result<Vec<Vec<String>>> {
        let mut runs = WhitespaceSegmenter.segment_batch(lines)?;
        runs.pop();
        Ok(runs)
    }
}

fn config(root: &Path, workers: usize) -> CorpusConfig {
    CorpusConfig {
        input_dir: root.join("data"),
        results_dir: root.join("results"),
        num_workers: workers,
        ..CorpusConfig::default()
    }
}

fn write_input(root: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let p = root.join("data").join(name);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(&p, body).unwrap();
    p
}

fn doc(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

fn unigram_path(cfg: &CorpusConfig, input: &str) -> PathBuf {
    cfg.results_dir.join("word_freq").join(format!("{input}.csv"))
}

fn bigram_path(cfg: &CorpusConfig, input: &str) -> PathBuf {
    cfg.results_dir.join("next_word_freq").join(format!("{input}.csv"))
}

#[test]
fn test_single_document_scenario() {
    let root = tempfile::tempdir().unwrap();
    let d = doc("我爱北京。\n我爱上海。");
    write_input(root.path(), "a.jsonl", &[d.as_str()]);
    let seg = TableSegmenter::new(&[
        ("我爱北京。", &["我", "爱", "北京", "。"][..]),
        ("我爱上海。", &["我", "爱", "上海", "。"][..]),
    ]);

    let cfg = config(root.path(), 1);
    let report = run_corpus(&cfg, &seg).unwrap();
    report.ensure_success().unwrap();
    assert_eq!(report.vocab_size, 4);
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].documents, 1);
    assert_eq!(report.files[0].sub_lines, 2);
    assert_eq!(report.files[0].tokens, 6);

    assert_eq!(
        fs::read_to_string(cfg.vocab_path()).unwrap(),
        "我,0\n爱,1\n北京,2\n上海,3\n"
    );
    assert_eq!(
        fs::read_to_string(unigram_path(&cfg, "a.jsonl")).unwrap(),
        "0,2\n1,2\n2,1\n3,1\n"
    );
    let bigrams = fs::read_to_string(bigram_path(&cfg, "a.jsonl")).unwrap();
    assert_eq!(bigrams, "0,1,2\n1,2,1\n1,3,1\n");
    // 北京 -> 我 would cross the sub-line boundary
    assert!(!bigrams.contains("2,0,"));
}

#[test]
fn test_missing_or_null_text_is_empty() {
    let root = tempfile::tempdir().unwrap();
    write_input(
        root.path(),
        "a.jsonl",
        &[r#"{"id": 1}"#, r#"{"text": null}"#, "", r#"{"text": "北京 上海"}"#],
    );
    let cfg = config(root.path(), 2);
    let report = run_corpus(&cfg, &WhitespaceSegmenter).unwrap();
    report.ensure_success().unwrap();

    let r = &report.files[0];
    assert_eq!(r.documents, 3);
    assert_eq!(r.skipped_lines, 0);
    assert_eq!(r.tokens, 2);
    assert_eq!(report.vocab_size, 2);
}

#[test]
fn test_malformed_line_skip_policy() {
    let root = tempfile::tempdir().unwrap();
    let good = doc("北京 上海");
    write_input(root.path(), "a.jsonl", &[good.as_str(), "{not json", good.as_str()]);

    let cfg = config(root.path(), 2);
    let report = run_corpus(&cfg, &WhitespaceSegmenter).unwrap();
    report.ensure_success().unwrap();

    let r = &report.files[0];
    assert_eq!(r.documents, 2);
    assert_eq!(r.skipped_lines, 1);
    assert_eq!(read_unigram_csv(&unigram_path(&cfg, "a.jsonl")).unwrap(), vec![(0, 2), (1, 2)]);
}

#[test]
fn test_failing_file_is_isolated() {
    let root = tempfile::tempdir().unwrap();
    let ok = doc("北京 上海\n天津");
    write_input(root.path(), "a.jsonl", &[ok.as_str()]);
    let partial = doc("广州 深圳");
    write_input(root.path(), "b.jsonl", &[partial.as_str(), "{broken"]);

    let cfg = CorpusConfig {
        on_malformed: MalformedLinePolicy::Fail,
        ..config(root.path(), 4)
    };
    let report = run_corpus(&cfg, &WhitespaceSegmenter).unwrap();

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("b.jsonl"));
    let msg = report.ensure_success().unwrap_err().to_string();
    assert!(msg.contains("1 of 2 files failed"), "{msg}");

    assert!(unigram_path(&cfg, "a.jsonl").exists());
    assert!(bigram_path(&cfg, "a.jsonl").exists());
    assert!(!unigram_path(&cfg, "b.jsonl").exists());
    assert!(!bigram_path(&cfg, "b.jsonl").exists());

    // 失败文件在出错前解析到的 token 仍留在词表中，词表保持稠密
    assert_vocab_consistent(&read_vocab_csv(&cfg.vocab_path()).unwrap());
    assert!(cfg.vocab_path().exists());
}

#[test]
fn test_segmenter_failure_and_bad_utf8_fail_only_their_file() {
    let root = tempfile::tempdir().unwrap();
    let ok = doc("北京 上海");
    let bad = doc("坏 数据");
    write_input(root.path(), "a.jsonl", &[ok.as_str()]);
    write_input(root.path(), "b.jsonl", &[ok.as_str(), bad.as_str()]);
    fs::write(root.path().join("data").join("c.jsonl"), b"{\"text\": \"\xff\xfe\"}\n").unwrap();

    let cfg = config(root.path(), 3);
    let report = run_corpus(&cfg, &FailingSegmenter).unwrap();

    assert_eq!(report.files.len(), 1);
    let mut failed: Vec<String> = report
        .failures
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    failed.sort();
    assert_eq!(failed, vec!["b.jsonl", "c.jsonl"]);
    assert_eq!(report.vocab_size, 2);
}

#[test]
fn test_segmenter_run_count_mismatch_fails_file() {
    let root = tempfile::tempdir().unwrap();
    let d = doc("北京\n上海");
    write_input(root.path(), "a.jsonl", &[d.as_str()]);
    let report = run_corpus(&config(root.path(), 1), &ShortSegmenter).unwrap();
    assert_eq!(report.failures.len(), 1);
    let msg = format!("{:#}", report.failures[0].error);
    assert!(msg.contains("token runs"), "{msg}");
}

#[test]
fn test_empty_input_dir_writes_empty_vocab() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("data")).unwrap();
    let cfg = config(root.path(), 2);
    let report = run_corpus(&cfg, &WhitespaceSegmenter).unwrap();
    assert_eq!(report.total_files(), 0);
    assert_eq!(fs::read_to_string(cfg.vocab_path()).unwrap(), "");
    assert!(cfg.results_dir.join("word_freq").is_dir());
    assert!(cfg.results_dir.join("next_word_freq").is_dir());
}

#[test]
fn test_recursive_same_file_name_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let a = doc("北京 上海");
    let b = doc("广州 深圳 广州");
    write_input(root.path(), "a/x.jsonl", &[a.as_str()]);
    write_input(root.path(), "b/x.jsonl", &[b.as_str()]);

    let cfg = CorpusConfig {
        recursive: true,
        ..config(root.path(), 4)
    };
    let err = run_corpus(&cfg, &WhitespaceSegmenter).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("x.jsonl.csv"), "{msg}");
    assert!(!unigram_path(&cfg, "x.jsonl").exists());
    assert!(!bigram_path(&cfg, "x.jsonl").exists());
    assert!(!cfg.vocab_path().exists());
}

#[test]
fn test_recursive_distinct_file_names_all_written() {
    let root = tempfile::tempdir().unwrap();
    let a = doc("北京 上海");
    let b = doc("广州 深圳 广州");
    write_input(root.path(), "a/x.jsonl", &[a.as_str()]);
    write_input(root.path(), "b/y.jsonl", &[b.as_str()]);

    let cfg = CorpusConfig {
        recursive: true,
        ..config(root.path(), 4)
    };
    let report = run_corpus(&cfg, &WhitespaceSegmenter).unwrap();
    report.ensure_success().unwrap();
    assert_eq!(report.files.len(), 2);
    assert_eq!(read_unigram_csv(&unigram_path(&cfg, "x.jsonl")).unwrap().len(), 2);
    let y: u64 = read_unigram_csv(&unigram_path(&cfg, "y.jsonl"))
        .unwrap()
        .iter()
        .map(|(_, c)| c)
        .sum();
    assert_eq!(y, 3);
}

#[test]
fn test_missing_input_dir_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    assert!(run_corpus(&config(root.path(), 1), &WhitespaceSegmenter).is_err());
}

const WORDS: &[&str] = &[
    "北京", "上海", "天津", "重庆", "广州", "深圳", "杭州", "南京", "成都", "武汉", "西安", "苏州",
    "长沙", "郑州", "青岛", "大连", "厦门", "宁波", "昆明", "沈阳", "我", "你", "他", "爱",
];

/// Deterministic pseudo-random corpus: many files sharing most of their vocabulary.
fn write_overlapping_corpus(root: &Path, files: usize, docs_per_file: usize) {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    for f in 0..files {
        let mut lines = Vec::with_capacity(docs_per_file);
        for _ in 0..docs_per_file {
            let mut text = String::new();
            for sub in 0..3 {
                if sub > 0 {
                    text.push('\n');
                }
                for _ in 0..8 {
                    text.push_str(WORDS[(next() % WORDS.len() as u64) as usize]);
                    text.push(' ');
                }
                text.push_str("。 ");
                // 每个文件独有的词
                text.push_str(&format!("文件{}", ["甲", "乙", "丙", "丁"][f % 4]));
            }
            lines.push(doc(&text));
        }
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        write_input(root, &format!("part-{f:03}.jsonl"), &refs);
    }
}

fn assert_vocab_consistent(vocab: &[(String, u32)]) {
    let mut ids: Vec<u32> = vocab.iter().map(|(_, id)| *id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..vocab.len() as u32).collect::<Vec<_>>());
    let mut toks: Vec<&str> = vocab.iter().map(|(t, _)| t.as_str()).collect();
    toks.sort_unstable();
    toks.dedup();
    assert_eq!(toks.len(), vocab.len());
}

/// Per-file counts keyed by token text, so runs with different id assignment compare equal.
type TokenCounts = HashMap<String, (HashMap<String, u64>, HashMap<(String, String), u64>)>;

fn counts_by_token(cfg: &CorpusConfig, report: &CorpusReport) -> (Vec<String>, TokenCounts) {
    let vocab = read_vocab_csv(&cfg.vocab_path()).unwrap();
    assert_vocab_consistent(&vocab);
    let by_id: HashMap<u32, String> = vocab.iter().map(|(t, id)| (*id, t.clone())).collect();

    let mut out = TokenCounts::new();
    for r in &report.files {
        let name = r.path.file_name().unwrap().to_str().unwrap().to_string();
        let uni = read_unigram_csv(&unigram_path(cfg, &name))
            .unwrap()
            .into_iter()
            .map(|(id, c)| (by_id[&id].clone(), c))
            .collect();
        let bi = read_bigram_csv(&bigram_path(cfg, &name))
            .unwrap()
            .into_iter()
            .map(|((a, b), c)| ((by_id[&a].clone(), by_id[&b].clone()), c))
            .collect();
        out.insert(name, (uni, bi));
    }
    let mut tokens: Vec<String> = vocab.into_iter().map(|(t, _)| t).collect();
    tokens.sort();
    (tokens, out)
}

#[test]
fn test_parallel_runs_match_single_worker() {
    let base = tempfile::tempdir().unwrap();
    write_overlapping_corpus(base.path(), 24, 40);

    let single = config(base.path(), 1);
    let report = run_corpus(&single, &WhitespaceSegmenter).unwrap();
    report.ensure_success().unwrap();
    let (tokens_1, counts_1) = counts_by_token(&single, &report);
    // 24 个城市/人称词 + 4 个文件独有词
    assert_eq!(tokens_1.len(), WORDS.len() + 4);

    for round in 0..5 {
        let cfg = CorpusConfig {
            results_dir: base.path().join(format!("results-{round}")),
            ..config(base.path(), 8)
        };
        let report = run_corpus(&cfg, &WhitespaceSegmenter).unwrap();
        report.ensure_success().unwrap();
        assert_eq!(report.vocab_size, tokens_1.len());

        let (tokens_k, counts_k) = counts_by_token(&cfg, &report);
        assert_eq!(tokens_k, tokens_1, "round {round}: token set differs");
        assert_eq!(counts_k, counts_1, "round {round}: per-file counts differ");
    }
}

#[test]
fn test_freq_summary_hash_ignores_id_assignment() {
    let base = tempfile::tempdir().unwrap();
    write_overlapping_corpus(base.path(), 12, 10);

    let run = |results: &str, workers: usize| -> serde_json::Value {
        let cfg = CorpusConfig {
            results_dir: base.path().join(results),
            ..config(base.path(), workers)
        };
        run_corpus(&cfg, &WhitespaceSegmenter)
            .unwrap()
            .ensure_success()
            .unwrap();
        let out = std::process::Command::new(env!("CARGO_BIN_EXE_freq_summary"))
            .arg("--results")
            .arg(&cfg.results_dir)
            .output()
            .unwrap();
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
        serde_json::from_slice(&out.stdout).unwrap()
    };

    let a = run("r1", 1);
    let b = run("r8", 8);
    assert_eq!(a, b);
    assert_eq!(a["files"], 12);
    assert_eq!(a["vocab"], WORDS.len() + 4);
}
