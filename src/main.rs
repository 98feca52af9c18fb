use anyhow::Result;
use clap::Parser;
use corpus_vocab::log::log_info;
use corpus_vocab::{build_segmenter, run_corpus, CorpusConfig, MalformedLinePolicy, SegmenterKind};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "corpus-vocab")]
#[command(
    about = "Build word_to_id + per-file word/next-word frequency CSVs from a JSONL corpus",
    long_about = None
)]
struct Args {
    /// 输入目录（每个文件每行一个 JSON 对象，读取 `text` 字段）
    #[arg(short, long, default_value = "data")]
    input_dir: PathBuf,

    /// 结果目录：word_to_id.csv、word_freq/、next_word_freq/
    #[arg(short, long, default_value = "results")]
    results_dir: PathBuf,

    /// 只处理文件名以此结尾的文件
    #[arg(long, default_value = ".jsonl")]
    suffix: String,

    /// 递归扫描子目录
    #[arg(long, default_value_t = false)]
    recursive: bool,

    /// 并行处理的文件数（0 表示自动=CPU核数）
    #[arg(long, default_value_t = 8)]
    num_workers: usize,

    /// 分词器
    #[arg(long, value_enum, default_value_t = SegmenterKind::Jieba)]
    segmenter: SegmenterKind,

    /// jieba：启用 HMM 新词发现
    #[arg(long, default_value_t = false)]
    hmm: bool,

    /// jieba：额外的用户词典
    #[arg(long)]
    user_dict: Option<PathBuf>,

    /// JSON 行解析失败时：skip=警告并跳过该行，fail=该文件失败
    #[arg(long, value_enum, default_value_t = MalformedLinePolicy::Skip)]
    on_malformed: MalformedLinePolicy,

    /// 词表文件名（位于结果目录下）
    #[arg(long, default_value = "word_to_id.csv")]
    vocab_file: String,

    /// 每个文件每 N 篇文档输出一次 debug 进度（0=关闭；需 LOG_LEVEL=debug）
    #[arg(long, default_value_t = 0)]
    progress_every: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    log_info(
        "main",
        format!(
            "start input_dir={:?} results_dir={:?} suffix={:?} segmenter={:?} hmm={} workers={} on_malformed={:?}",
            args.input_dir,
            args.results_dir,
            args.suffix,
            args.segmenter,
            args.hmm,
            args.num_workers,
            args.on_malformed
        ),
    );

    // 分词器只构造一次（jieba 加载词典较慢），所有 worker 共享
    let segmenter = build_segmenter(args.segmenter, args.hmm, args.user_dict.as_deref())?;

    let cfg = CorpusConfig {
        input_dir: args.input_dir,
        results_dir: args.results_dir,
        suffix: args.suffix,
        recursive: args.recursive,
        num_workers: args.num_workers,
        on_malformed: args.on_malformed,
        vocab_file: args.vocab_file,
        progress_every: args.progress_every,
    };

    let report = run_corpus(&cfg, segmenter.as_ref())?;
    report.ensure_success()?;
    log_info("main", "Processing of JSONL files complete.");
    Ok(())
}
