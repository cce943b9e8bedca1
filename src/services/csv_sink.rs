//! CSV 写入端
//!
//! 每种题型一个文件，表头只写一次；同一次运行中重复的题目（题干 + 答案相同）只写一次。

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StorageError;
use crate::models::{QuestionKind, QuestionRecord};
use crate::services::result_sink::ResultSink;

const HEADER: &[&str] = &[
    "Key",
    "Category",
    "Question",
    "Options",
    "CorrectAnswer",
    "Description",
    "Difficulty",
    "QuizUrl",
    "ImageUrl",
    "AudioUrl",
];

/// CSV 写入端
pub struct CsvSink {
    output_dir: PathBuf,
    files: HashMap<QuestionKind, File>,
    seen: HashSet<String>,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            files: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    async fn file_for(&mut self, kind: QuestionKind) -> Result<&mut File, StorageError> {
        if !self.files.contains_key(&kind) {
            let path = self.output_dir.join(kind.csv_file_name());
            let file = open_with_header(&path).await?;
            self.files.insert(kind, file);
        }
        self.files
            .get_mut(&kind)
            .ok_or(StorageError::WriterClosed)
    }
}

async fn open_with_header(path: &Path) -> Result<File, StorageError> {
    let display = path.display().to_string();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::write_failed(&display, e))?;
    }

    let is_new = fs::metadata(path).await.map(|m| m.len() == 0).unwrap_or(true);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| StorageError::write_failed(&display, e))?;

    if is_new {
        let header = format!("{}\n", HEADER.join(","));
        file.write_all(header.as_bytes())
            .await
            .map_err(|e| StorageError::write_failed(&display, e))?;
    }
    Ok(file)
}

/// 按 RFC 4180 转义一个字段
pub fn escape_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// 一条记录对应的 CSV 行（含换行）
pub fn to_row(record: &QuestionRecord) -> String {
    let options = record.options.join(" | ");
    let fields = [
        record.key.as_str(),
        record.category.as_str(),
        record.question.as_str(),
        options.as_str(),
        record.correct_answer.as_str(),
        record.description.as_deref().unwrap_or(""),
        record.difficulty.as_deref().unwrap_or(""),
        record.quiz_url.as_str(),
        record.image_url.as_deref().unwrap_or(""),
        record.audio_url.as_deref().unwrap_or(""),
    ];
    let mut row = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

#[async_trait]
impl ResultSink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    async fn write(&mut self, records: &[QuestionRecord]) -> Result<(), StorageError> {
        let mut duplicates = 0;
        for record in records {
            if !self.seen.insert(record.signature()) {
                duplicates += 1;
                continue;
            }
            let row = to_row(record);
            let path = self.output_dir.join(record.kind.csv_file_name());
            let file = self.file_for(record.kind).await?;
            file.write_all(row.as_bytes())
                .await
                .map_err(|e| StorageError::write_failed(path.display().to_string(), e))?;
        }
        if duplicates > 0 {
            debug!("CSV 跳过 {} 条重复题目", duplicates);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), StorageError> {
        for file in self.files.values_mut() {
            file.flush().await?;
            file.sync_data().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, kind: QuestionKind, question: &str) -> QuestionRecord {
        QuestionRecord {
            key: key.into(),
            category: "movies".into(),
            quiz_url: String::new(),
            kind,
            question: question.into(),
            options: vec!["A".into(), "B".into()],
            correct_answer: "A".into(),
            description: Some("said \"hi\", twice".into()),
            difficulty: None,
            image_url: None,
            audio_url: None,
        }
    }

    #[test]
    fn quotes_fields_that_need_it() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"x\""), "\"say \"\"x\"\"\"");
    }

    #[tokio::test]
    async fn writes_one_file_per_kind_with_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path());

        sink.write(&[
            record("1", QuestionKind::MultipleChoice, "Who?"),
            record("2", QuestionKind::TrueFalse, "True?"),
        ])
        .await
        .unwrap();
        sink.write(&[
            record("3", QuestionKind::MultipleChoice, "Where?"),
            record("1-dup", QuestionKind::MultipleChoice, "who? "),
        ])
        .await
        .unwrap();
        sink.flush().await.unwrap();

        let mc = std::fs::read_to_string(dir.path().join("multiple_choice.csv")).unwrap();
        let lines: Vec<&str> = mc.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Key,Category"));
        assert!(lines[1].contains("\"said \"\"hi\"\", twice\""));

        let tf = std::fs::read_to_string(dir.path().join("true_false.csv")).unwrap();
        assert_eq!(tf.lines().count(), 2);
        assert!(!dir.path().join("sound.csv").exists());
    }
}
