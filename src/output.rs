//! CSV 输出（逗号分隔、无表头、每行一条）及对应的读取函数。
//!
//! 合格 token 不含 ASCII 字符，所以 token 字段里不会出现逗号或换行，无需转义。
//! 写入先落到 `<name>.tmp`，成功 flush 后再 rename，失败时不会留下半个文件。

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const WORD_FREQ_DIR: &str = "word_freq";
pub const NEXT_WORD_FREQ_DIR: &str = "next_word_freq";
pub const VOCAB_FILE: &str = "word_to_id.csv";

/// `<输入文件名>.csv`，例如 `part-0001.jsonl` -> `part-0001.jsonl.csv`
pub fn output_file_name(input: &Path) -> Result<String> {
    let Some(name) = input.file_name().and_then(|s| s.to_str()) else {
        bail!("input path has no utf-8 file name: {input:?}");
    };
    Ok(format!("{name}.csv"))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

fn write_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let tmp = tmp_path(path);
    let res = (|| -> Result<()> {
        let f = File::create(&tmp).with_context(|| format!("create output failed: {tmp:?}"))?;
        let mut w = BufWriter::new(f);
        fill(&mut w).with_context(|| format!("write output failed: {tmp:?}"))?;
        w.flush().with_context(|| format!("flush output failed: {tmp:?}"))?;
        fs::rename(&tmp, path).with_context(|| format!("rename {tmp:?} -> {path:?} failed"))?;
        Ok(())
    })();
    if res.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    res
}

/// `token,id`
pub fn write_vocab_csv(path: &Path, entries: &[(String, u32)]) -> Result<()> {
    write_atomic(path, |w| {
        for (tok, id) in entries {
            writeln!(w, "{tok},{id}")?;
        }
        Ok(())
    })
}

/// `id,count`
pub fn write_unigram_csv(path: &Path, rows: &[(u32, u64)]) -> Result<()> {
    write_atomic(path, |w| {
        for (id, count) in rows {
            writeln!(w, "{id},{count}")?;
        }
        Ok(())
    })
}

/// `prev_id,id,count`
pub fn write_bigram_csv(path: &Path, rows: &[((u32, u32), u64)]) -> Result<()> {
    write_atomic(path, |w| {
        for ((prev, id), count) in rows {
            writeln!(w, "{prev},{id},{count}")?;
        }
        Ok(())
    })
}

fn parse_field<T: FromStr>(path: &Path, lineno: usize, field: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| anyhow::anyhow!("{path:?}:{lineno}: invalid number {field:?}"))
}

fn for_each_row<F>(path: &Path, expected_fields: usize, mut f: F) -> Result<()>
where
    F: FnMut(usize, &[&str]) -> Result<()>,
{
    let file = File::open(path).with_context(|| format!("open csv failed: {path:?}"))?;
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let lineno = i + 1;
        let line = line.with_context(|| format!("read csv failed: {path:?}:{lineno}"))?;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != expected_fields {
            bail!(
                "{path:?}:{lineno}: expected {expected_fields} fields, got {}",
                fields.len()
            );
        }
        f(lineno, &fields)?;
    }
    Ok(())
}

pub fn read_vocab_csv(path: &Path) -> Result<Vec<(String, u32)>> {
    let mut out = Vec::new();
    for_each_row(path, 2, |lineno, fields| {
        out.push((fields[0].to_string(), parse_field(path, lineno, fields[1])?));
        Ok(())
    })?;
    Ok(out)
}

pub fn read_unigram_csv(path: &Path) -> Result<Vec<(u32, u64)>> {
    let mut out = Vec::new();
    for_each_row(path, 2, |lineno, fields| {
        out.push((
            parse_field(path, lineno, fields[0])?,
            parse_field(path, lineno, fields[1])?,
        ));
        Ok(())
    })?;
    Ok(out)
}

pub fn read_bigram_csv(path: &Path) -> Result<Vec<((u32, u32), u64)>> {
    let mut out = Vec::new();
    for_each_row(path, 3, |lineno, fields| {
        out.push((
            (
                parse_field(path, lineno, fields[0])?,
                parse_field(path, lineno, fields[1])?,
            ),
            parse_field(path, lineno, fields[2])?,
        ));
        Ok(())
    })?;
    Ok(out)
}
