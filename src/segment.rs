//! 分词器接口与实现。
//!
//! worker 只依赖 [`Segmenter`]：给定一批文本行，返回每行的 token 序列（保持行序和词序）。

use anyhow::{Context, Result};
use clap::ValueEnum;
use jieba_rs::Jieba;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 批量分词。实现必须可以在多个 worker 之间共享。
pub trait Segmenter: Send + Sync {
    /// 每个输入行对应一个输出序列，长度必须与 `lines` 相同。
    fn segment_batch(&self, lines: &[&str]) -> Result<Vec<Vec<String>>>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SegmenterKind {
    /// jieba 中文分词
    Jieba,
    /// 按空白切分（语料已预先分好词）
    Whitespace,
}

/// jieba-rs 分词。`Jieba::cut` 只需要 `&self`，一个实例即可供所有 worker 共用。
pub struct JiebaSegmenter {
    jieba: Jieba,
    hmm: bool,
}

impl JiebaSegmenter {
    pub fn new(hmm: bool) -> Self {
        Self {
            jieba: Jieba::new(),
            hmm,
        }
    }

    /// 额外加载用户词典（jieba 词典格式：`词 [词频] [词性]` 每行一条）
    pub fn with_user_dict(hmm: bool, dict: &Path) -> Result<Self> {
        let mut seg = Self::new(hmm);
        let f = File::open(dict).with_context(|| format!("open user dict failed: {dict:?}"))?;
        let mut reader = BufReader::new(f);
        seg.jieba
            .load_dict(&mut reader)
            .map_err(|e| anyhow::anyhow!("load user dict failed: {dict:?}: {e}"))?;
        Ok(seg)
    }
}

impl Segmenter for JiebaSegmenter {
    fn segment_batch(&self, lines: &[&str]) -> Result<Vec<Vec<String>>> {
        Ok(lines
            .iter()
            .map(|line| {
                self.jieba
                    .cut(line, self.hmm)
                    .into_iter()
                    .map(str::to_owned)
                    .collect()
            })
            .collect())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceSegmenter;

impl Segmenter for WhitespaceSegmenter {
    fn segment_batch(&self, lines: &[&str]) -> Result<Vec<Vec<String>>> {
        Ok(lines
            .iter()
            .map(|line| line.split_whitespace().map(str::to_owned).collect())
            .collect())
    }
}

/// 按 CLI 选项构造分词器（只在启动时构造一次）
pub fn build_segmenter(
    kind: SegmenterKind,
    hmm: bool,
    user_dict: Option<&Path>,
) -> Result<Box<dyn Segmenter>> {
    Ok(match kind {
        SegmenterKind::Jieba => match user_dict {
            Some(p) => Box::new(JiebaSegmenter::with_user_dict(hmm, p)?),
            None => Box::new(JiebaSegmenter::new(hmm)),
        },
        SegmenterKind::Whitespace => {
            if user_dict.is_some() {
                anyhow::bail!("--user-dict is only supported with the jieba segmenter");
            }
            Box::new(WhitespaceSegmenter)
        }
    })
}
