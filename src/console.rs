use thiserror::Error;

use crate::model::{ActionKind, ActionRequest, ResourceKind};

pub const CONSOLE_HELP: &str = "\
describe <kind> <namespace>/<name>
logs <kind> <namespace>/<name>
delete <kind> <namespace>/<name>
exec <kind> <namespace>/<name> -- <command>
clear | help
<name> may also be given as `<name> -n <namespace>`";

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConsoleCommand {
    Run(ActionRequest),
    Clear,
    Help,
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ConsoleError {
    #[error("type a command, or `help`")]
    Empty,
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("unknown resource kind `{0}`")]
    UnknownKind(String),
    #[error("missing resource name")]
    MissingTarget,
    #[error("no namespace for `{0}`; use <namespace>/<name> or -n <namespace>")]
    MissingNamespace(String),
    #[error("exec needs a command after `--`")]
    MissingCommand,
}

/// Parses one console line. `default_namespace` fills in a bare name.
pub fn parse_console_line(
    line: &str,
    default_namespace: Option<&str>,
) -> Result<ConsoleCommand, ConsoleError> {
    let (head, command) = match line.split_once(" -- ") {
        Some((head, command)) => (head, Some(command.trim().to_string())),
        None => (line, None),
    };
    let tokens = head.split_whitespace().collect::<Vec<_>>();
    let Some((verb, rest)) = tokens.split_first() else {
        return Err(ConsoleError::Empty);
    };

    match verb.to_ascii_lowercase().as_str() {
        "clear" | "cls" => return Ok(ConsoleCommand::Clear),
        "help" | "?" => return Ok(ConsoleCommand::Help),
        _ => {}
    }

    let action =
        ActionKind::from_token(verb).ok_or_else(|| ConsoleError::UnknownAction(verb.to_string()))?;
    let Some((kind_token, rest)) = rest.split_first() else {
        return Err(ConsoleError::MissingTarget);
    };
    let kind = ResourceKind::from_token(kind_token)
        .ok_or_else(|| ConsoleError::UnknownKind(kind_token.to_string()))?;

    let mut target = None;
    let mut namespace_flag = None;
    let mut iter = rest.iter();
    while let Some(token) = iter.next() {
        match *token {
            "-n" | "--namespace" => namespace_flag = iter.next().map(|value| value.to_string()),
            value if target.is_none() => target = Some(value.to_string()),
            _ => {}
        }
    }
    let target = target.ok_or(ConsoleError::MissingTarget)?;

    let (namespace, name) = match target.split_once('/') {
        Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
            (namespace.to_string(), name.to_string())
        }
        Some(_) => return Err(ConsoleError::MissingTarget),
        None => {
            let namespace = namespace_flag
                .or_else(|| default_namespace.map(str::to_string))
                .ok_or_else(|| ConsoleError::MissingNamespace(target.clone()))?;
            (namespace, target)
        }
    };

    let command = command.filter(|command| !command.is_empty());
    if action == ActionKind::Exec && command.is_none() {
        return Err(ConsoleError::MissingCommand);
    }

    Ok(ConsoleCommand::Run(ActionRequest {
        action,
        kind,
        namespace,
        name,
        command: if action == ActionKind::Exec { command } else { None },
    }))
}

#[cfg(test)]
mod tests {
    use super::{ConsoleCommand, ConsoleError, parse_console_line};
    use crate::model::{ActionKind, ActionRequest, ResourceKind};

    #[test]
    fn parses_namespaced_targets() {
        let command = parse_console_line("logs po prod/api-7f9", None).unwrap();
        assert_eq!(
            command,
            ConsoleCommand::Run(ActionRequest {
                action: ActionKind::Logs,
                kind: ResourceKind::Pods,
                namespace: "prod".to_string(),
                name: "api-7f9".to_string(),
                command: None,
            })
        );
    }

    #[test]
    fn bare_names_use_flag_or_default_namespace() {
        let ConsoleCommand::Run(request) =
            parse_console_line("describe deploy api -n staging", Some("default")).unwrap()
        else {
            panic!("expected action");
        };
        assert_eq!(request.namespace, "staging");

        let ConsoleCommand::Run(request) =
            parse_console_line("delete svc api", Some("default")).unwrap()
        else {
            panic!("expected action");
        };
        assert_eq!(request.namespace, "default");

        assert_eq!(
            parse_console_line("delete svc api", None),
            Err(ConsoleError::MissingNamespace("api".to_string()))
        );
    }

    #[test]
    fn exec_requires_command() {
        let ConsoleCommand::Run(request) =
            parse_console_line("exec pod prod/api -- ls -la /tmp", None).unwrap()
        else {
            panic!("expected action");
        };
        assert_eq!(request.command.as_deref(), Some("ls -la /tmp"));
        assert_eq!(
            parse_console_line("exec pod prod/api", None),
            Err(ConsoleError::MissingCommand)
        );
    }

    #[test]
    fn rejects_unknown_words() {
        assert_eq!(parse_console_line("   ", None), Err(ConsoleError::Empty));
        assert_eq!(
            parse_console_line("restart po a/b", None),
            Err(ConsoleError::UnknownAction("restart".to_string()))
        );
        assert_eq!(
            parse_console_line("logs nodes a/b", None),
            Err(ConsoleError::UnknownKind("nodes".to_string()))
        );
        assert_eq!(parse_console_line("logs po", None), Err(ConsoleError::MissingTarget));
        assert_eq!(parse_console_line("clear", None), Ok(ConsoleCommand::Clear));
    }
}
