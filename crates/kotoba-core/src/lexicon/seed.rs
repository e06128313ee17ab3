//! Built-in seed dictionary. Loaded whenever neither the cache nor the raw
//! source can be read, so the store is never empty.

use super::entry::{DictionaryEntry, PartOfSpeech, Register};

use super::entry::PartOfSpeech::{Adjective as A, Adverb as D, Noun as N, Verb as V};
use super::entry::Register::{Casual as C, Formal as F, Neutral as U};

struct Seed {
    word: &'static str,
    reading: &'static str,
    pos: &'static [PartOfSpeech],
    definitions: &'static [&'static str],
    synonyms: &'static [&'static str],
    antonyms: &'static [&'static str],
    register: Register,
}

const fn s(
    word: &'static str,
    reading: &'static str,
    pos: &'static [PartOfSpeech],
    definitions: &'static [&'static str],
    synonyms: &'static [&'static str],
    register: Register,
) -> Seed {
    Seed {
        word,
        reading,
        pos,
        definitions,
        synonyms,
        antonyms: &[],
        register,
    }
}

const SEEDS: &[Seed] = &[
    // nouns
    s("問題", "もんだい", &[N], &["problem; question"], &["課題"], U),
    s("課題", "かだい", &[N], &["task; issue; problem"], &["問題"], U),
    s("方法", "ほうほう", &[N], &["method; process; manner"], &["手段", "やり方"], U),
    s("手段", "しゅだん", &[N], &["means; method; measure"], &["方法"], U),
    s("やり方", "やりかた", &[N], &["manner of doing; method"], &["方法"], C),
    s("猫", "ねこ", &[N], &["cat"], &[], U),
    s("犬", "いぬ", &[N], &["dog"], &[], U),
    s("友達", "ともだち", &[N], &["friend; companion"], &["友人"], U),
    s("友人", "ゆうじん", &[N], &["friend; companion"], &["友達"], U),
    s("仕事", "しごと", &[N], &["work; job; business"], &["業務"], U),
    s("業務", "ぎょうむ", &[N], &["business; duties; work"], &["仕事"], F),
    s("考え", "かんがえ", &[N], &["thought; idea; opinion"], &["意見", "発想"], U),
    s("意見", "いけん", &[N], &["opinion; view"], &["考え"], U),
    s("発想", "はっそう", &[N], &["idea; conception; thought"], &["考え"], U),
    // adjectives
    s("好き", "すき", &[A], &["liked; favourite; fond"], &["大好き"], U),
    s("大好き", "だいすき", &[A], &["loved; very fond"], &["好き"], U),
    s("重要", "じゅうよう", &[A, N], &["important; essential"], &["大切", "大事"], U),
    s("大切", "たいせつ", &[A], &["important; precious"], &["重要", "大事"], U),
    s("大事", "だいじ", &[A], &["important; valuable; precious"], &["大切", "重要"], U),
    s("嬉しい", "うれしい", &[A], &["happy; glad; pleased"], &["喜ばしい", "楽しい"], U),
    s("喜ばしい", "よろこばしい", &[A], &["joyful; glad; delightful"], &["嬉しい"], F),
    s("楽しい", "たのしい", &[A], &["enjoyable; pleasant; fun"], &["愉快"], U),
    s("愉快", "ゆかい", &[A], &["pleasant; delightful; enjoyable"], &["楽しい"], U),
    s("美しい", "うつくしい", &[A], &["beautiful; lovely"], &["綺麗"], U),
    s("綺麗", "きれい", &[A], &["pretty; lovely; clean"], &["美しい"], U),
    s("速い", "はやい", &[A], &["fast; quick; rapid"], &["素早い"], U),
    s("素早い", "すばやい", &[A], &["quick; nimble; rapid"], &["速い"], U),
    Seed {
        antonyms: &["易しい"],
        ..s("難しい", "むずかしい", &[A], &["difficult; hard"], &["困難"], U)
    },
    s("困難", "こんなん", &[A, N], &["difficulty; hardship; difficult"], &["難しい"], F),
    Seed {
        antonyms: &["難しい"],
        ..s("易しい", "やさしい", &[A], &["easy; simple; plain"], &["簡単"], U)
    },
    s("簡単", "かんたん", &[A], &["simple; easy; brief"], &["易しい"], U),
    // verbs
    s("言う", "いう", &[V], &["to say; to utter"], &["話す", "述べる"], U),
    s("話す", "はなす", &[V], &["to talk; to speak; to tell"], &["言う"], U),
    s("述べる", "のべる", &[V], &["to state; to express; to mention"], &["言う"], F),
    s("見る", "みる", &[V], &["to see; to look; to watch"], &["眺める"], U),
    s("眺める", "ながめる", &[V], &["to look at; to gaze; to watch"], &["見る"], U),
    s("考える", "かんがえる", &[V], &["to think about; to consider"], &["思う"], U),
    s("思う", "おもう", &[V], &["to think; to consider; to feel"], &["考える"], U),
    s("始める", "はじめる", &[V], &["to start; to begin"], &["開始"], U),
    s("開始", "かいし", &[N, V], &["start; beginning; commencement"], &["始める"], F),
    // adverbs
    s("とても", "とても", &[D], &["very; awfully; exceedingly"], &["非常に", "大変"], U),
    s("非常に", "ひじょうに", &[D], &["very; extremely; exceedingly"], &["とても", "大変"], F),
    s("大変", "たいへん", &[D, A], &["very; greatly; serious"], &["とても"], U),
    s("本当に", "ほんとうに", &[D], &["really; truly"], &["実に"], U),
    s("実に", "じつに", &[D], &["really; truly; indeed"], &["本当に"], F),
    s("すごく", "すごく", &[D], &["awfully; very; terribly"], &["とても"], C),
    s("少し", "すこし", &[D], &["small quantity; little; few"], &["ちょっと"], U),
    s("ちょっと", "ちょっと", &[D], &["a little; a bit; slightly"], &["少し"], C),
];

pub fn seed_entries() -> Vec<DictionaryEntry> {
    SEEDS
        .iter()
        .map(|seed| {
            let reading = (seed.reading != seed.word).then(|| seed.reading.to_string());
            let definitions = seed.definitions.iter().map(|d| d.to_string()).collect();
            DictionaryEntry::new(seed.word, reading, definitions)
                .with_pos(seed.pos)
                .with_synonyms(seed.synonyms)
                .with_antonyms(seed.antonyms)
                .with_register(seed.register)
                .with_source("seed")
        })
        .collect()
}
