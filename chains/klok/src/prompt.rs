//! Random chat prompts.
//!
//! Each call picks one of three strategies uniformly: a lorem-ipsum
//! sentence, a topic question, or a canned conversational prompt.

use rand::seq::SliceRandom;
use rand::Rng;

const LOREM_WORDS: &[&str] = &[
    "ad", "adipisicing", "aliqua", "aliquip", "amet", "anim", "aute", "cillum", "commodo",
    "consectetur", "consequat", "culpa", "cupidatat", "deserunt", "do", "dolor", "dolore", "duis",
    "ea", "eiusmod", "elit", "enim", "esse", "est", "et", "eu", "ex", "excepteur", "exercitation",
    "fugiat", "id", "in", "incididunt", "ipsum", "irure", "labore", "laboris", "laborum", "lorem",
    "magna", "minim", "mollit", "nisi", "non", "nostrud", "nulla", "occaecat", "officia",
    "pariatur", "proident", "qui", "quis", "reprehenderit", "sint", "sit", "sunt", "tempor",
    "ullamco", "ut", "velit", "veniam", "voluptate",
];

const MIN_WORDS_PER_SENTENCE: usize = 4;
const MAX_WORDS_PER_SENTENCE: usize = 10;

pub const TOPICS: &[&str] = &[
    "artificial intelligence",
    "machine learning",
    "technology",
    "science",
    "nature",
    "philosophy",
    "art",
    "music",
    "history",
    "literature",
];

const QUESTION_TEMPLATES: &[&str] = &[
    "What do you think about {}?",
    "Can you tell me something interesting about {}?",
    "How has {} changed in recent years?",
    "Why is {} important?",
    "What's your favorite aspect of {}?",
];

pub const CONVERSATIONAL_PROMPTS: &[&str] = &[
    "Tell me something I might not know.",
    "What's the most interesting thing you've learned recently?",
    "If you could solve one global problem, what would it be?",
    "What's a book or article that changed your perspective?",
    "What's a common misconception many people have?",
    "How would you explain complex ideas to someone new to the topic?",
    "What advancements do you think we'll see in the next decade?",
    "What's a skill everyone should learn?",
    "How do you approach learning something new?",
    "What makes a good conversation in your opinion?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStrategy {
    Lorem,
    TopicQuestion,
    Conversational,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PromptSource;

impl PromptSource {
    pub fn new() -> Self {
        Self
    }

    pub fn next_prompt<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let strategy = match rng.gen_range(0..3) {
            0 => PromptStrategy::Lorem,
            1 => PromptStrategy::TopicQuestion,
            _ => PromptStrategy::Conversational,
        };
        self.generate(strategy, rng)
    }

    pub fn generate<R: Rng + ?Sized>(&self, strategy: PromptStrategy, rng: &mut R) -> String {
        match strategy {
            PromptStrategy::Lorem => lorem_sentence(rng),
            PromptStrategy::TopicQuestion => {
                let topic = TOPICS.choose(rng).copied().unwrap_or("technology");
                let template = QUESTION_TEMPLATES
                    .choose(rng)
                    .copied()
                    .unwrap_or(QUESTION_TEMPLATES[0]);
                template.replace("{}", topic)
            }
            PromptStrategy::Conversational => CONVERSATIONAL_PROMPTS
                .choose(rng)
                .copied()
                .unwrap_or(CONVERSATIONAL_PROMPTS[0])
                .to_string(),
        }
    }

    /// Endless stream of prompts drawn from `rng`.
    pub fn prompts<'a, R: Rng + ?Sized>(
        &'a self,
        rng: &'a mut R,
    ) -> impl Iterator<Item = String> + 'a {
        std::iter::repeat_with(move || self.next_prompt(rng))
    }
}

fn lorem_sentence<R: Rng + ?Sized>(rng: &mut R) -> String {
    let count = rng.gen_range(MIN_WORDS_PER_SENTENCE..=MAX_WORDS_PER_SENTENCE);
    let words: Vec<&str> = (0..count)
        .map(|_| LOREM_WORDS[rng.gen_range(0..LOREM_WORDS.len())])
        .collect();

    let mut sentence = words.join(" ");
    if let Some(first) = sentence.get(0..1) {
        let upper = first.to_uppercase();
        sentence.replace_range(0..1, &upper);
    }
    sentence.push('.');
    sentence
}
