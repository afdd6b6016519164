//! /lang command - list and switch locales

use super::CommandResult;
use parley_voice::Language;

pub struct LanguageCommand;

impl LanguageCommand {
    pub fn execute(args: &str, current: Language) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(list_languages(current));
        }
        match args.parse::<Language>() {
            Ok(language) => CommandResult::ChangeLanguage(language),
            Err(e) => CommandResult::Message(format!("{}\nSee /lang for the list", e)),
        }
    }
}

fn list_languages(current: Language) -> String {
    let mut output = String::from("Languages:\n\n");

    for language in Language::ALL {
        let marker = if language == current { " *" } else { "" };
        output.push_str(&format!(
            "  {:<7} {:<10} {}{}\n",
            language.tag(),
            language.english_name(),
            language.native_name(),
            marker
        ));
    }

    output.push_str("\nSet with: /lang <tag>");
    output
}
