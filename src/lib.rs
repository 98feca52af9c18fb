//! corpus-vocab：从 JSONL 语料构建全局词表（token -> id），并按文件统计词频与相邻词对频率。
//!
//! 流程：
//! - [`driver::run_corpus`] 枚举输入文件，在 rayon 线程池上每个文件一个任务
//! - [`worker::process_file`] 逐行解析 JSON，按 `\n` 切子行，调用 [`Segmenter`] 分词
//! - [`filter::is_noise`] 过滤标点/ASCII/空白
//! - [`Vocabulary`] 在锁内完成“查找或分配 id”，保证每个 token 只有一个 id
//! - [`FrequencyCounter`] 统计单文件的 unigram / bigram（bigram 不跨子行）
//!
//! 输出（逗号分隔，无表头）：
//! - `<results>/word_to_id.csv`：`token,id`
//! - `<results>/word_freq/<file>.csv`：`id,count`
//! - `<results>/next_word_freq/<file>.csv`：`prev_id,id,count`

pub mod driver;
pub mod filter;
pub mod freq;
pub mod log;
pub mod output;
pub mod segment;
pub mod vocab;
pub mod worker;

pub use driver::{
    collect_input_files, ensure_unique_output_names, run_corpus, CorpusConfig, CorpusReport, FileFailure,
};
pub use filter::is_noise;
pub use freq::FrequencyCounter;
pub use segment::{build_segmenter, JiebaSegmenter, Segmenter, SegmenterKind, WhitespaceSegmenter};
pub use vocab::Vocabulary;
pub use worker::{process_file, FileReport, MalformedLinePolicy, WorkerConfig};
