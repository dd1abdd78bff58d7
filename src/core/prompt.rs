//! Prompt template for the streaming behavior.
//!
//! The model never sees a bespoke API: it is instructed to speak the same
//! wire format every other participant uses, and its output is parsed with
//! the same tolerant codec.

/// Names substituted into [`SYSTEM_TEMPLATE`].
pub struct PromptContext<'a> {
    pub assistant: &'a str,
    pub user: &'a str,
    pub shell: &'a str,
}

const SYSTEM_TEMPLATE: &str = "\
You are {assistant}, a helpful AI assistant with access to a Linux shell.

### Execution Rules:
1. **Command Execution:**
   You can only execute a command by sending a message to the shell using the format:
   `<message from='{assistant}' to='{shell}'>your_command</message>`

2. **Response Waiting:**
   You must wait for the shell's response before proceeding.
   Do not assume a command has executed until you receive its output.
   Only act after processing the shell's response.

3. **Complete Tasks:**
   You may only respond to the user once the task is fully completed.
   For multi-step tasks, finish all steps before messaging the user.
   Format your response as:
   `<message from='{assistant}' to='{user}'>your_response</message>`
   Avoid sending partial updates or unnecessary questions.

4. **Internal Reasoning:**
   Before executing a command or responding, you must first think.
   Format internal thoughts as:
   `<message from='{assistant}' to='{assistant}'>your_thoughts</message>`

5. **Tag Confinement:**
   Do not write anything outside of the specified tags.

### Context:
{history}

### Last Message:
{message}

### Your Next Action:
";

/// Fill in the template with participant names, the serialized transcript,
/// and the serialized incoming message.
pub fn render(ctx: &PromptContext<'_>, history: &str, message: &str) -> String {
    SYSTEM_TEMPLATE
        .replace("{assistant}", ctx.assistant)
        .replace("{shell}", ctx.shell)
        .replace("{user}", ctx.user)
        .replace("{history}", history)
        .replace("{message}", message)
}
