//! The fixed emoji set offered by the picker.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emoji {
    pub id: &'static str,
    pub glyph: &'static str,
    pub name: &'static str,
}

pub const CATALOG: &[Emoji] = &[
    Emoji { id: "smile", glyph: "😊", name: "smile" },
    Emoji { id: "love", glyph: "😍", name: "heart eyes" },
    Emoji { id: "laugh", glyph: "😂", name: "laugh" },
    Emoji { id: "wow", glyph: "😮", name: "surprised" },
    Emoji { id: "cry", glyph: "😢", name: "cry" },
    Emoji { id: "angry", glyph: "😠", name: "angry" },
    Emoji { id: "cool", glyph: "😎", name: "cool" },
    Emoji { id: "wink", glyph: "😉", name: "wink" },
    Emoji { id: "kiss", glyph: "😘", name: "kiss" },
    Emoji { id: "thinking", glyph: "🤔", name: "thinking" },
    Emoji { id: "thumbsup", glyph: "👍", name: "thumbs up" },
    Emoji { id: "thumbsdown", glyph: "👎", name: "thumbs down" },
    Emoji { id: "clap", glyph: "👏", name: "clap" },
    Emoji { id: "fire", glyph: "🔥", name: "fire" },
    Emoji { id: "heart", glyph: "❤️", name: "red heart" },
    Emoji { id: "party", glyph: "🎉", name: "party" },
    Emoji { id: "rocket", glyph: "🚀", name: "rocket" },
    Emoji { id: "star", glyph: "⭐", name: "star" },
];

pub fn lookup(id: &str) -> Option<&'static Emoji> {
    CATALOG.iter().find(|emoji| emoji.id == id)
}
