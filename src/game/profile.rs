//! Character Profiles
//!
//! Player and AI character data, form validation, and the prompts built
//! from a profile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cache::{CharacterDescriptor, Descriptor};
use crate::error::{AppError, Result};

const GENDERS: [&str; 3] = ["male", "female", "other"];

// == Character Profile ==
/// A player or AI character. Unused fields stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterProfile {
    pub nickname: String,
    /// `male`, `female` or `other`
    pub gender: String,
    pub personality: String,
    pub identity: String,
    /// World view
    pub background: String,
    pub character: String,
    pub traits: String,
    /// AI only: visual description used for portraits
    pub appearance: String,
    /// AI only: role settings fed to the chat persona
    pub settings: String,
    /// AI only: first line spoken when a session starts
    pub opening: String,
    pub chat_style: String,
    pub relationship: String,
    pub outfit: String,
}

// == Validation ==
#[derive(Default)]
struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Required field: must be non-blank and at most `max` characters.
    fn required(&mut self, field: &str, value: &str, max: usize, empty_msg: &str, long_msg: &str) {
        let len = value.trim().chars().count();
        if len == 0 {
            self.0.insert(field.to_string(), empty_msg.to_string());
        } else if len > max {
            self.0.insert(field.to_string(), long_msg.to_string());
        }
    }

    /// Optional field: only the length is checked.
    fn optional(&mut self, field: &str, value: &str, max: usize, long_msg: &str) {
        if value.trim().chars().count() > max {
            self.0.insert(field.to_string(), long_msg.to_string());
        }
    }

    fn gender(&mut self, value: &str) {
        if !GENDERS.contains(&value) {
            self.0.insert("gender".to_string(), "请选择性别".to_string());
        }
    }

    fn into_result(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

impl CharacterProfile {
    // == Player Profile ==
    pub fn validate_player(&self) -> Result<()> {
        let mut errors = FieldErrors::default();
        errors.required("nickname", &self.nickname, 20, "请输入昵称", "昵称不能超过20个字符");
        errors.gender(&self.gender);
        errors.required("personality", &self.personality, 200, "请描述人设", "人设描述不能超过200个字符");
        errors.required("identity", &self.identity, 50, "请输入身份", "身份描述不能超过50个字符");
        errors.required("character", &self.character, 50, "请描述性格", "性格描述不能超过50个字符");
        errors.required("traits", &self.traits, 50, "请描述特质", "特质描述不能超过50个字符");
        errors.required("background", &self.background, 300, "请描述世界观", "世界观描述不能超过300个字符");
        errors.into_result()
    }

    /// Validates form input and builds a trimmed player profile.
    pub fn create_player(form: &CharacterProfile) -> Result<Self> {
        form.validate_player()?;
        Ok(Self {
            nickname: form.nickname.trim().to_string(),
            gender: form.gender.clone(),
            personality: form.personality.trim().to_string(),
            identity: form.identity.trim().to_string(),
            character: form.character.trim().to_string(),
            traits: form.traits.trim().to_string(),
            background: form.background.trim().to_string(),
            ..Self::default()
        })
    }

    // == AI Profile ==
    pub fn validate_ai(&self) -> Result<()> {
        let mut errors = FieldErrors::default();
        errors.required("nickname", &self.nickname, 20, "请输入昵称", "昵称不能超过20个字符");
        errors.gender(&self.gender);
        errors.optional("personality", &self.personality, 200, "人设描述不能超过200个字符");
        errors.optional("identity", &self.identity, 50, "身份描述不能超过50个字符");
        errors.optional("background", &self.background, 300, "世界观描述不能超过300个字符");
        errors.required("settings", &self.settings, 500, "请描述AI角色设定", "设定描述不能超过500个字符");
        errors.required("appearance", &self.appearance, 300, "请描述外观特征", "外观描述不能超过300个字符");
        errors.required("opening", &self.opening, 200, "请输入开场白", "开场白不能超过200个字符");
        errors.into_result()
    }

    /// Validates form input and builds a trimmed AI profile.
    pub fn create_ai(form: &CharacterProfile) -> Result<Self> {
        form.validate_ai()?;
        Ok(Self {
            nickname: form.nickname.trim().to_string(),
            gender: form.gender.clone(),
            personality: form.personality.trim().to_string(),
            identity: form.identity.trim().to_string(),
            background: form.background.trim().to_string(),
            settings: form.settings.trim().to_string(),
            appearance: form.appearance.trim().to_string(),
            opening: form.opening.trim().to_string(),
            ..Self::default()
        })
    }

    fn require_ai(&self) -> Result<()> {
        if self.appearance.is_empty() {
            return Err(AppError::InvalidRequest(
                "This is not an AI character profile".to_string(),
            ));
        }
        Ok(())
    }

    // == Prompts ==
    /// Persona prompt given to the chat model.
    pub fn system_prompt(&self) -> Result<String> {
        self.require_ai()?;
        let name = &self.nickname;
        Ok(format!(
            "你现在是{name}，不是AI助手。

角色背景：{settings}

【绝对禁止】
- 禁止说\"好的\"、\"需要\"、\"可以\"开头
- 禁止分析角色、分析场景、分析任务
- 禁止说\"作为\"、\"根据\"、\"设定\"、\"规则\"
- 禁止用第三人称描述自己
- 禁止解释你要做什么

【必须遵守】
- 直接用{name}的身份说话
- 像真人聊天一样简短自然
- 用\"我\"称呼自己
- 回复控制在30字以内

【回复格式】
只输出{name}说的话，可以加动作描写如（笑）、*歪头*

错误示范：好的，需要构建一个自然的对话场景...
正确示范：诶？你怎么来了呀~（惊喜地看着你）

现在用户对你说话，直接回应：",
            settings = self.settings
        ))
    }

    /// Portrait prompt for the image model.
    pub fn image_prompt(&self) -> Result<String> {
        self.require_ai()?;
        let gender = match self.gender.as_str() {
            "male" => "male",
            "female" => "female",
            _ => "person",
        };
        Ok(format!(
            "1{}, {}, anime character portrait, solo, transparent background, no background, \
             white background, character only, full body, high quality anime art, visual novel \
             style, standing pose, isolated character, PNG with transparency, cutout style, clean \
             background removal, professional character design, white backdrop for easy removal",
            gender, self.appearance
        ))
    }

    /// Cache descriptor identifying this character's portrait.
    pub fn descriptor(&self) -> Descriptor {
        Descriptor::Character(CharacterDescriptor {
            nickname: self.nickname.clone(),
            gender: self.gender.clone(),
            appearance: self.appearance.clone(),
            settings: self.settings.clone(),
        })
    }
}
