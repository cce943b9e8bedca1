use serde::{Deserialize, Serialize};

/// 题目类型，决定写入哪个 CSV 文件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    Sound,
}

impl QuestionKind {
    /// 对应的 CSV 文件名
    pub fn csv_file_name(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple_choice.csv",
            QuestionKind::TrueFalse => "true_false.csv",
            QuestionKind::Sound => "sound.csv",
        }
    }
}

/// 提取出来的一道题
///
/// 编排层不关心其中的内容，只负责转交给结果写入端。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub key: String,
    pub category: String,
    #[serde(default)]
    pub quiz_url: String,
    pub kind: QuestionKind,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl QuestionRecord {
    /// 去重签名：题干 + 正确答案（忽略大小写与首尾空白）
    pub fn signature(&self) -> String {
        format!(
            "{}|{}",
            self.question.trim().to_lowercase(),
            self.correct_answer.trim().to_lowercase()
        )
    }
}
