use serde::{Deserialize, Serialize};

/// 表单中的单个字段描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// 控件的 `name` 属性
    pub name: String,
    /// 输入类型或标签名，例如 "text"、"file"、"textarea"
    pub kind: String,
    pub required: bool,
    /// 人类可读的标签，找不到时等于字段名
    pub label: String,
    /// 下拉框 / 单选组可选的值
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FormField {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }

    pub fn is_checkbox(&self) -> bool {
        self.kind == "checkbox"
    }

    /// 只能从固定选项中取值的控件
    pub fn is_choice(&self) -> bool {
        matches!(self.kind.as_str(), "select" | "radio")
    }

    /// 把自由文本回答对应到某个选项（忽略大小写和首尾空白）
    pub fn match_option(&self, answer: &str) -> Option<&str> {
        let answer = answer.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '.');
        self.options
            .iter()
            .find(|option| option.eq_ignore_ascii_case(answer))
            .map(String::as_str)
    }
}

/// 表单字段结构：字段名 → 描述，保持页面中的出现顺序
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFieldSchema {
    fields: Vec<FormField>,
}

impl FormFieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入字段；同名字段（如单选组）只保留第一次出现，必填标记和选项取并集
    pub fn insert(&mut self, field: FormField) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => {
                existing.required |= field.required;
                for option in field.options {
                    if !existing.options.contains(&option) {
                        existing.options.push(option);
                    }
                }
            }
            None => self.fields.push(field),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter()
    }
}
