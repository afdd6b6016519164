//! /action command - canned assistant prompts

use super::CommandResult;
use parley_ai::QuickAction;

pub struct ActionCommand;

impl ActionCommand {
    pub fn execute(args: &str) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(list_actions());
        }
        match QuickAction::from_id(&args.to_lowercase()) {
            Some(action) => CommandResult::Submit(action.prompt()),
            None => CommandResult::Message(format!(
                "Unknown action: '{}'\nSee /action for the list",
                args
            )),
        }
    }
}

fn list_actions() -> String {
    let mut output = String::from("Quick actions:\n\n");
    for action in QuickAction::ALL {
        output.push_str(&format!(
            "  {:<12} {:<17} {}\n",
            action.id(),
            action.title(),
            action.description()
        ));
    }
    output.push_str("\nSend with: /action <id>");
    output
}
