use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{Error, Result};
use crate::roadmap::get_field;

/// Questions drawn per quiz when the caller doesn't ask for a count.
pub const QUIZ_LENGTH: usize = 3;

/// Separates the choices inside the `options` column of a question bank.
const OPTION_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct: usize,
    pub explanation: String,
}

impl Question {
    fn new(question: &str, options: &[&str], correct: usize, explanation: &str) -> Self {
        Question {
            question: question.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct,
            explanation: explanation.to_string(),
        }
    }
}

pub fn builtin_bank() -> Vec<Question> {
    vec![
        Question::new(
            "What does CIA stand for in cybersecurity?",
            &[
                "Central Intelligence Agency",
                "Confidentiality, Integrity, Availability",
                "Computer Information Access",
                "Cyber Intelligence Analysis",
            ],
            1,
            "CIA in cybersecurity refers to the three core principles: Confidentiality, \
             Integrity, and Availability.",
        ),
        Question::new(
            "Which port is commonly used for HTTPS?",
            &["80", "443", "22", "21"],
            1,
            "Port 443 is the standard port for HTTPS (HTTP Secure) connections.",
        ),
        Question::new(
            "What type of attack involves overwhelming a system with traffic?",
            &["SQL Injection", "Cross-Site Scripting", "DDoS", "Phishing"],
            2,
            "DDoS (Distributed Denial of Service) attacks overwhelm systems with massive \
             amounts of traffic.",
        ),
        Question::new(
            "Which tool is commonly used for network scanning?",
            &["Wireshark", "Nmap", "John the Ripper", "Hashcat"],
            1,
            "Nmap (Network Mapper) is the most popular tool for network discovery and \
             security scanning.",
        ),
        Question::new(
            "What does the 'S' in HTTPS stand for?",
            &["Safe", "Secure", "System", "Server"],
            1,
            "The 'S' in HTTPS stands for 'Secure', indicating encrypted communication.",
        ),
    ]
}

/// Reads a question bank with the header `question,options,answer,explanation`.
///
/// Options are `|`-separated and `answer` is the 1-based number of the right
/// option, the way the quiz prompt numbers them. Rows without a question are
/// skipped.
pub fn load_bank(path: &Path) -> Result<Vec<Question>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let mut questions = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        let invalid = |reason: String| Error::InvalidQuestion { line, reason };

        let question = get_field(&record, 0);
        if question.is_empty() {
            continue;
        }

        let options: Vec<String> = get_field(&record, 1)
            .split(OPTION_SEPARATOR)
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if options.len() < 2 {
            return Err(invalid("needs at least two options".into()));
        }

        let answer = get_field(&record, 2);
        let correct = match answer.parse::<usize>() {
            Ok(n) if (1..=options.len()).contains(&n) => n - 1,
            _ => {
                return Err(invalid(format!(
                    "answer {answer:?} is not between 1 and {}",
                    options.len()
                )));
            }
        };

        questions.push(Question {
            question,
            options,
            correct,
            explanation: get_field(&record, 3),
        });
    }
    tracing::debug!(
        path = %path.display(),
        questions = questions.len(),
        "question bank loaded"
    );
    Ok(questions)
}

/// How one answer was marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marking {
    pub correct: bool,
    /// The right option, shown when the answer was wrong.
    pub correct_option: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Excellent,
    Good,
    Fair,
    KeepStudying,
}

impl Tier {
    pub fn from_percentage(percentage: u32) -> Tier {
        match percentage {
            90.. => Tier::Excellent,
            70..=89 => Tier::Good,
            50..=69 => Tier::Fair,
            _ => Tier::KeepStudying,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Tier::Excellent => "Excellent! You're mastering this material!",
            Tier::Good => "Good job! Keep learning to improve further.",
            Tier::Fair => "Not bad, but review the concepts you missed.",
            Tier::KeepStudying => "Keep studying! You'll get there with practice.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizResult {
    pub correct: usize,
    pub total: usize,
    pub percentage: u32,
    pub tier: Tier,
}

/// `round(correct / total * 100)`, 0 for an empty quiz.
pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u32
}

/// A round of questions and the answers given so far.
#[derive(Debug, Clone)]
pub struct Quiz {
    questions: Vec<Question>,
    answers: Vec<Option<bool>>,
}

impl Quiz {
    pub fn new(questions: Vec<Question>) -> Quiz {
        let answers = vec![None; questions.len()];
        Quiz { questions, answers }
    }

    /// Up to `count` questions from `bank` in random order.
    pub fn draw<R: Rng + ?Sized>(bank: &[Question], count: usize, rng: &mut R) -> Quiz {
        let mut questions = bank.to_vec();
        questions.shuffle(rng);
        questions.truncate(count);
        Quiz::new(questions)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Marks `choice` for question `index`. Only the first answer to a
    /// question counts; later ones are marked but not recorded. `None` when
    /// either index is out of range.
    pub fn answer(&mut self, index: usize, choice: usize) -> Option<Marking> {
        let question = self.questions.get(index)?;
        if choice >= question.options.len() {
            return None;
        }
        let marking = Marking {
            correct: choice == question.correct,
            correct_option: question.correct,
        };
        let slot = &mut self.answers[index];
        if slot.is_none() {
            *slot = Some(marking.correct);
        }
        Some(marking)
    }

    pub fn is_finished(&self) -> bool {
        self.answers.iter().all(Option::is_some)
    }

    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| **a == Some(true)).count()
    }

    /// Unanswered questions count as wrong.
    pub fn result(&self) -> QuizResult {
        let correct = self.correct_count();
        let total = self.questions.len();
        let percentage = percentage(correct, total);
        QuizResult {
            correct,
            total,
            percentage,
            tier: Tier::from_percentage(percentage),
        }
    }
}
