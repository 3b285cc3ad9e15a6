//! Content Classifier
//!
//! Keyword-table detection of scene changes and emotions in dialogue text.
//! The tables are plain data; adding a keyword never requires new logic.

use serde::Serialize;

// == Scene ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    Park,
    Classroom,
    Cafe,
    Home,
    School,
    Street,
    Restaurant,
    Library,
    Beach,
    Mountain,
    Office,
    Hospital,
}

/// Checked in order; the first matching keyword wins.
const SCENE_TABLE: &[(SceneKind, &[&str])] = &[
    (SceneKind::Park, &["公园", "草地", "树木", "长椅", "花园"]),
    (SceneKind::Classroom, &["教室", "课堂", "黑板", "讲台", "上课"]),
    (SceneKind::Cafe, &["咖啡厅", "咖啡店", "咖啡馆", "奶茶店"]),
    (SceneKind::Home, &["家里", "房间", "客厅", "卧室", "家中"]),
    (SceneKind::School, &["学校", "校园", "操场", "图书馆", "食堂"]),
    (SceneKind::Street, &["街道", "马路", "商店", "路边", "街上"]),
    (SceneKind::Restaurant, &["餐厅", "饭店", "用餐", "吃饭"]),
    (SceneKind::Library, &["图书馆", "书店", "阅读室"]),
    (SceneKind::Beach, &["海边", "沙滩", "海滩", "海岸"]),
    (SceneKind::Mountain, &["山上", "山顶", "爬山", "登山"]),
    (SceneKind::Office, &["办公室", "公司", "工作"]),
    (SceneKind::Hospital, &["医院", "诊所", "看病"]),
];

impl SceneKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SceneKind::Park => "park",
            SceneKind::Classroom => "classroom",
            SceneKind::Cafe => "cafe",
            SceneKind::Home => "home",
            SceneKind::School => "school",
            SceneKind::Street => "street",
            SceneKind::Restaurant => "restaurant",
            SceneKind::Library => "library",
            SceneKind::Beach => "beach",
            SceneKind::Mountain => "mountain",
            SceneKind::Office => "office",
            SceneKind::Hospital => "hospital",
        }
    }

    /// Scene description used both as image prompt fragment and cache descriptor.
    pub fn description(self) -> String {
        format!(
            "beautiful anime {} scene, detailed background, soft lighting, peaceful atmosphere",
            self.as_str()
        )
    }
}

// == Emotion ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionKind {
    Happy,
    Sad,
    Angry,
    Surprised,
    Shy,
    Worried,
    Confused,
    Excited,
}

const EMOTION_TABLE: &[(EmotionKind, &[&str])] = &[
    (EmotionKind::Happy, &["开心", "高兴", "快乐", "兴奋", "愉快", "哈哈", "笑", "😊", "😄", "😁"]),
    (EmotionKind::Sad, &["难过", "伤心", "沮丧", "失落", "悲伤", "哭", "😢", "😭", "😞"]),
    (EmotionKind::Angry, &["生气", "愤怒", "恼火", "气愤", "讨厌", "😠", "😡", "🤬"]),
    (EmotionKind::Surprised, &["惊讶", "震惊", "意外", "吃惊", "哇", "😲", "😮", "😯"]),
    (EmotionKind::Shy, &["害羞", "羞涩", "不好意思", "脸红", "😳", "😊"]),
    (EmotionKind::Worried, &["担心", "焦虑", "忧虑", "不安", "紧张", "😟", "😰", "😨"]),
    (EmotionKind::Confused, &["困惑", "疑惑", "不明白", "奇怪", "🤔", "😕"]),
    (EmotionKind::Excited, &["激动", "兴奋", "期待", "太好了", "棒", "🤩", "😍"]),
];

impl EmotionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EmotionKind::Happy => "happy",
            EmotionKind::Sad => "sad",
            EmotionKind::Angry => "angry",
            EmotionKind::Surprised => "surprised",
            EmotionKind::Shy => "shy",
            EmotionKind::Worried => "worried",
            EmotionKind::Confused => "confused",
            EmotionKind::Excited => "excited",
        }
    }
}

// == Detection ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    None,
    Scene(SceneKind),
    Emotion(EmotionKind),
}

fn first_match<K: Copy>(table: &[(K, &[&str])], text: &str) -> Option<K> {
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(kind, _)| *kind)
}

pub fn detect_scene(text: &str) -> Option<SceneKind> {
    first_match(SCENE_TABLE, text)
}

/// Emotions in table order, at most one per kind.
pub fn detect_emotions(text: &str) -> Vec<EmotionKind> {
    EMOTION_TABLE
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(kind, _)| *kind)
        .collect()
}

/// Classifies a reply. A scene change takes precedence over an emotion.
pub fn classify(text: &str) -> Detection {
    if let Some(scene) = detect_scene(text) {
        return Detection::Scene(scene);
    }
    match first_match(EMOTION_TABLE, text) {
        Some(emotion) => Detection::Emotion(emotion),
        None => Detection::None,
    }
}

// == Default Scene ==
/// Opening background derived from the AI character's world settings.
pub fn default_scene(settings: &str) -> &'static str {
    let has = |words: &[&str]| words.iter().any(|w| settings.contains(w));
    if has(&["学校", "同学", "班级"]) {
        "beautiful anime school campus, cherry blossoms, sunny day, peaceful atmosphere"
    } else if has(&["咖啡", "店"]) {
        "cozy anime cafe interior, warm lighting, comfortable atmosphere"
    } else if has(&["图书馆"]) {
        "quiet anime library, bookshelves, soft sunlight through windows"
    } else if has(&["公园"]) {
        "beautiful anime park scene, green trees, peaceful lake"
    } else {
        "beautiful anime outdoor scene, soft lighting, peaceful atmosphere, cherry blossoms"
    }
}

// == Voice Emotion ==
/// Emotions understood by the speech synthesis backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceEmotionKind {
    Happy,
    Sad,
    Angry,
    Surprised,
    Shy,
    Worried,
    Confused,
    Excited,
    Gentle,
    Playful,
}

impl VoiceEmotionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VoiceEmotionKind::Happy => "happy",
            VoiceEmotionKind::Sad => "sad",
            VoiceEmotionKind::Angry => "angry",
            VoiceEmotionKind::Surprised => "surprised",
            VoiceEmotionKind::Shy => "shy",
            VoiceEmotionKind::Worried => "worried",
            VoiceEmotionKind::Confused => "confused",
            VoiceEmotionKind::Excited => "excited",
            VoiceEmotionKind::Gentle => "gentle",
            VoiceEmotionKind::Playful => "playful",
        }
    }
}

/// Detected voice emotion with an intensity in `[1, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceEmotion {
    pub kind: VoiceEmotionKind,
    pub scale: u8,
}

const VOICE_EMOTION_TABLE: &[(VoiceEmotionKind, u8, &[&str])] = &[
    (VoiceEmotionKind::Happy, 4, &["开心", "高兴", "快乐", "兴奋", "愉快", "哈哈", "笑", "太好了", "棒", "耶", "嘿嘿"]),
    (VoiceEmotionKind::Sad, 3, &["难过", "伤心", "沮丧", "失落", "悲伤", "哭", "呜呜", "555"]),
    (VoiceEmotionKind::Angry, 4, &["生气", "愤怒", "恼火", "气愤", "讨厌", "烦人", "可恶"]),
    (VoiceEmotionKind::Surprised, 4, &["惊讶", "震惊", "意外", "吃惊", "哇", "天哪", "不会吧", "真的吗"]),
    (VoiceEmotionKind::Shy, 3, &["害羞", "羞涩", "不好意思", "脸红", "羞羞", "人家"]),
    (VoiceEmotionKind::Worried, 3, &["担心", "焦虑", "忧虑", "不安", "紧张", "怎么办"]),
    (VoiceEmotionKind::Confused, 2, &["困惑", "疑惑", "不明白", "奇怪", "为什么", "怎么回事"]),
    (VoiceEmotionKind::Excited, 5, &["激动", "兴奋", "期待", "迫不及待", "好想", "超级"]),
    (VoiceEmotionKind::Gentle, 2, &["温柔", "轻声", "小声", "柔和", "慢慢", "轻轻"]),
    (VoiceEmotionKind::Playful, 3, &["调皮", "淘气", "嘿嘿", "略略", "哼哼", "嘻嘻"]),
];

/// Picks the voice emotion with the most keyword matches (earliest on ties),
/// then adjusts for punctuation and sentence-final particles.
pub fn detect_voice_emotion(text: &str) -> Option<VoiceEmotion> {
    let mut detected: Option<VoiceEmotionKind> = None;
    let mut best = 0;
    let mut scale: u8 = 3;

    for (kind, intensity, keywords) in VOICE_EMOTION_TABLE {
        let matches = keywords.iter().filter(|k| text.contains(*k)).count();
        if matches > best {
            best = matches;
            detected = Some(*kind);
            scale = *intensity;
        }
    }

    if text.contains("！！") || text.contains("？？") {
        scale = (scale + 1).min(5);
    } else if text.contains("...") || text.contains("。。。") {
        scale = scale.saturating_sub(1).max(1);
    }

    if ["呢~", "哦~", "呀~"].iter().any(|p| text.contains(p)) {
        if detected.is_none() {
            detected = Some(VoiceEmotionKind::Gentle);
            scale = 2;
        }
    } else if text.contains("哈哈") || text.contains("嘿嘿") {
        detected = Some(VoiceEmotionKind::Happy);
        scale = 4;
    }

    detected.map(|kind| VoiceEmotion { kind, scale })
}
