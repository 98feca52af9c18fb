use anyhow::{bail, Context, Result};
use clap::Parser;
use corpus_vocab::output::{
    read_bigram_csv, read_unigram_csv, read_vocab_csv, NEXT_WORD_FREQ_DIR, VOCAB_FILE, WORD_FREQ_DIR,
};
use hashbrown::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// FNV-1a 64 over the vocabulary's token set; each token is terminated by a NUL byte
/// so `["ab", "c"]` and `["a", "bc"]` hash differently.
struct TokenSetHash(u64);

impl TokenSetHash {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new() -> Self {
        Self(Self::OFFSET)
    }

    fn push_token(&mut self, token: &str) {
        for b in token.bytes().chain(std::iter::once(0u8)) {
            self.0 = (self.0 ^ u64::from(b)).wrapping_mul(Self::PRIME);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "freq_summary",
    about = "Validate a corpus-vocab results dir and print summary stats plus a token-set hash"
)]
struct Args {
    /// results dir (output of corpus-vocab)
    #[arg(long, default_value = "results")]
    results: PathBuf,

    /// vocabulary file name inside the results dir
    #[arg(long, default_value = VOCAB_FILE)]
    vocab_file: String,
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for ent in fs::read_dir(dir).with_context(|| format!("read_dir failed: {dir:?}"))? {
        let path = ent?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("csv") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let vocab_path = args.results.join(&args.vocab_file);
    let vocab = read_vocab_csv(&vocab_path)?;

    // id 必须是 0..N 且互不重复；token 也不能重复
    let n = vocab.len();
    let mut seen_ids = vec![false; n];
    let mut seen_tokens: HashSet<&str> = HashSet::with_capacity(n);
    for (tok, id) in &vocab {
        let idx = *id as usize;
        if idx >= n || seen_ids[idx] {
            bail!("vocabulary ids are not dense/unique: token {tok:?} id {id}");
        }
        seen_ids[idx] = true;
        if !seen_tokens.insert(tok.as_str()) {
            bail!("token {tok:?} appears twice in {vocab_path:?}");
        }
    }

    let check_id = |id: u32, path: &Path| -> Result<()> {
        if (id as usize) >= n {
            bail!("{path:?} references unknown id {id}");
        }
        Ok(())
    };

    let mut files = 0u64;
    let mut unigram_total = 0u64;
    for p in csv_files(&args.results.join(WORD_FREQ_DIR))? {
        for (id, count) in read_unigram_csv(&p)? {
            check_id(id, &p)?;
            unigram_total += count;
        }
        files += 1;
    }

    let mut bigram_total = 0u64;
    for p in csv_files(&args.results.join(NEXT_WORD_FREQ_DIR))? {
        for ((prev, id), count) in read_bigram_csv(&p)? {
            check_id(prev, &p)?;
            check_id(id, &p)?;
            bigram_total += count;
        }
    }

    // 与 id 无关：按 token 字典序哈希，可用于比较不同并行度的运行结果
    let mut tokens: Vec<&str> = vocab.iter().map(|(t, _)| t.as_str()).collect();
    tokens.sort_unstable();
    let mut hasher = TokenSetHash::new();
    for t in tokens {
        hasher.push_token(t);
    }
    let h = hasher.finish();

    println!(
        "{}",
        serde_json::json!({
            "vocab": n,
            "files": files,
            "unigram_total": unigram_total,
            "bigram_total": bigram_total,
            "token_set_fnv64": format!("0x{h:016x}"),
        })
    );
    Ok(())
}
