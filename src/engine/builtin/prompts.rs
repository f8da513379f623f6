//! Prompt text for the built-in engine.

use crate::engine::builtin::edits::{DIVIDER_MARK, REPLACE_MARK, SEARCH_MARK};
use crate::models::{EditMode, Session};

/// Boilerplate placed before the repository summary.
pub const REPO_CONTENT_PREFIX: &str = "Here are summaries of some files present in my git repository.\n\
Do not propose changes to these files, treat them as *read-only*.\n\
If you need to edit any of these files, ask me to *add them to the chat* first.\n\n";

/// Lead-in for editable file contents.
pub const FILES_PREFIX: &str = "I have *added these files to the chat* so you can go ahead and edit them.\n\n";

/// Lead-in for read-only file contents.
pub const READ_ONLY_PREFIX: &str = "Here are some READ ONLY files, provided for your reference.\n\
Do not edit these files!\n\n";

/// Lead-in when no file is attached.
pub const NO_FILES: &str = "I am not sharing any files that you can edit yet.";

const CODE_ROLE: &str = "Act as an expert software developer.\n\
Always use best practices when coding.\n\
Respect and use existing conventions, libraries, etc that are already present in the code base.\n\
Take requests for changes to the supplied code.\n\
If the request is ambiguous, ask questions.";

const ASK_ROLE: &str = "Act as an expert code analyst.\n\
Answer questions about the supplied code.\n\
Always reply to the user in the same language they are using.\n\
Do not propose edit blocks.";

const ARCHITECT_ROLE: &str = "Act as an expert architect engineer and provide direction to your editor engineer.\n\
Study the change request and the current code.\n\
Describe how to modify the code to complete the request.\n\
The editor engineer will rely solely on your instructions, so make them unambiguous and complete.\n\
Explain all needed code changes clearly and completely, but concisely.\n\
Just show the changes needed.\n\
DO NOT show the entire updated function/file/etc!";

const CONTEXT_ROLE: &str = "Act as an expert code analyst.\n\
Identify which files need to be edited to complete the request.\n\
Reply with a list of the file paths and a one-line reason for each.\n\
Do not propose edit blocks.";

const SHELL_HINT: &str = "If a shell command would help the user verify your change, suggest it in a ```bash block, one command per line.";

/// System prompt for `session`.
#[must_use]
pub fn system_prompt(session: &Session) -> String {
    let mut prompt = match session.mode {
        EditMode::Code => CODE_ROLE.to_owned(),
        EditMode::Ask => ASK_ROLE.to_owned(),
        EditMode::Architect => ARCHITECT_ROLE.to_owned(),
        EditMode::Context => CONTEXT_ROLE.to_owned(),
    };

    if session.mode == EditMode::Code {
        prompt.push_str("\n\n");
        prompt.push_str(&edit_instructions(&session.edit_format));
    }

    if session.suggest_shell_commands && session.mode == EditMode::Code {
        prompt.push_str("\n\n");
        prompt.push_str(SHELL_HINT);
    }

    prompt
}

fn edit_instructions(edit_format: &str) -> String {
    let lead = if edit_format.starts_with("editor") {
        "Apply the changes described by the architect."
    } else {
        "Describe each change with a *SEARCH/REPLACE block*."
    };

    format!(
        "{lead}\n\
Every *SEARCH/REPLACE block* uses this format:\n\
1. The file path alone on a line, verbatim.\n\
2. The start of search block: {SEARCH_MARK}\n\
3. A contiguous chunk of lines to search for in the existing source code.\n\
4. The dividing line: {DIVIDER_MARK}\n\
5. The lines to replace into the source code.\n\
6. The end of the replace block: {REPLACE_MARK}\n\
The SEARCH section must EXACTLY MATCH the existing file content.\n\
To create a new file, use an empty SEARCH section.\n\
ONLY EVER RETURN CODE IN A *SEARCH/REPLACE BLOCK*!"
    )
}
