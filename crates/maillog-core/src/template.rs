use regex::{Captures, Regex};

use crate::config::Daemon;
use crate::error::CorrelateError;
use crate::types::QueueId;

pub const PLACEHOLDER_SERVER: &str = "@SERVER@";
pub const PLACEHOLDER_SEARCH: &str = "@SEARCH@";
pub const PLACEHOLDER_ID: &str = "@ID@";
pub const PLACEHOLDER_DAEMON_SMTPD: &str = "@DAEMON_SMTPD@";
pub const PLACEHOLDER_DAEMON_PICKUP: &str = "@DAEMON_PICKUP@";
pub const PLACEHOLDER_DAEMON_CLEANUP: &str = "@DAEMON_CLEANUP@";
pub const PLACEHOLDER_DAEMON_OPENDKIM: &str = "@DAEMON_OPENDKIM@";
pub const PLACEHOLDER_DAEMON_QMGR: &str = "@DAEMON_QMGR@";
pub const PLACEHOLDER_DAEMON_DELIVERY: &str = "@DAEMON_DELIVERY@";

/// Postfix delivery agents that report `status=` for a recipient.
pub const DELIVERY_AGENTS: &[&str] = &[
    "postfix/smtp",
    "postfix/lmtp",
    "postfix/local",
    "postfix/virtual",
    "postfix/pipe",
    "postfix/error",
];

// Syslog header: classic `Mon  d hh:mm:ss` (day space-padded) or RFC 3339,
// followed by the host name.
const IDS_SMTPD: &str = r"^(?:[A-Za-z]+ +\d+ +\d{2}:\d{2}:\d{2}|\d{4}-\d{2}-\d{2}T\S+) +(?:@SERVER@) +(?:@DAEMON_SMTPD@)\[\d+\]: (?P<id>[A-Za-z0-9]+): client=(?:@SEARCH@).*$";
const IDS_PICKUP: &str = r"^(?:[A-Za-z]+ +\d+ +\d{2}:\d{2}:\d{2}|\d{4}-\d{2}-\d{2}T\S+) +(?:@SERVER@) +(?:@DAEMON_PICKUP@)\[\d+\]: (?P<id>[A-Za-z0-9]+): .*from=<(?:@SEARCH@)>.*$";
const IDS_CLEANUP: &str = r"^(?:[A-Za-z]+ +\d+ +\d{2}:\d{2}:\d{2}|\d{4}-\d{2}-\d{2}T\S+) +(?:@SERVER@) +(?:@DAEMON_CLEANUP@)\[\d+\]: (?P<id>[A-Za-z0-9]+): message-id=<[^ ]+@(?:@SEARCH@)>.*$";
const IDS_OPENDKIM: &str = r"^(?:[A-Za-z]+ +\d+ +\d{2}:\d{2}:\d{2}|\d{4}-\d{2}-\d{2}T\S+) +(?:@SERVER@) +(?:@DAEMON_OPENDKIM@)\[\d+\]: (?P<id>[A-Za-z0-9]+): .*\(.*(?:@SEARCH@).*\).*$";
const IDS_QMGR: &str = r"^(?:[A-Za-z]+ +\d+ +\d{2}:\d{2}:\d{2}|\d{4}-\d{2}-\d{2}T\S+) +(?:@SERVER@) +(?:@DAEMON_QMGR@)\[\d+\]: (?P<id>[A-Za-z0-9]+): .*from=<(?:@SEARCH@)>.*$";

// Any line of one queue id written by the selected host, whatever the daemon.
const RECORD_SCOPE: &str = r"^(?:[A-Za-z]+ +\d+ +\d{2}:\d{2}:\d{2}|\d{4}-\d{2}-\d{2}T\S+) +(?:@SERVER@) +\S+\[\d+\]: @ID@: ";

const FIELD_SOURCE: &str = r"^.+ (?:@DAEMON_CLEANUP@)\[\d+\]: @ID@: .*message-id=<[^ <>]+@(?P<source>[^ <>]+)>.*$";
const FIELD_FROM: &str = r"^.+ (?:@DAEMON_QMGR@)\[\d+\]: @ID@: .*from=<(?P<email>[^ <>]+@[^ <>]+)>,.*$";
const FIELD_SEND: &str = r"^.+ (?:@DAEMON_DELIVERY@)\[\d+\]: @ID@:.* to=<(?P<to>[^ <>]+@[^ <>]+)>, (?:orig_to=<(?P<orig_to>[^ <>]+@[^ <>]+)>, )?.*status=(?P<status>[a-z]+)\b.*$";
const FIELD_END: &str = r"^.+ (?:@DAEMON_QMGR@)\[\d+\]: @ID@:.* removed$";

/// Fixed line grammars. `Ids*` recover queue ids from a client-origin line,
/// `Scope` admits the lines of one queue id on the selected host, the others
/// extract record fields for that queue id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    IdsSmtpd,
    IdsPickup,
    IdsCleanup,
    IdsOpenDkim,
    IdsQmgr,
    Scope,
    Source,
    From,
    Send,
    End
}

impl Template {
    pub fn for_daemon(daemon: Daemon) -> Self {
        match daemon {
            Daemon::Smtpd => Self::IdsSmtpd,
            Daemon::Pickup => Self::IdsPickup,
            Daemon::Cleanup => Self::IdsCleanup,
            Daemon::OpenDkim => Self::IdsOpenDkim,
            Daemon::Qmgr => Self::IdsQmgr
        }
    }

    pub fn pattern(self) -> &'static str {
        match self {
            Self::IdsSmtpd => IDS_SMTPD,
            Self::IdsPickup => IDS_PICKUP,
            Self::IdsCleanup => IDS_CLEANUP,
            Self::IdsOpenDkim => IDS_OPENDKIM,
            Self::IdsQmgr => IDS_QMGR,
            Self::Scope => RECORD_SCOPE,
            Self::Source => FIELD_SOURCE,
            Self::From => FIELD_FROM,
            Self::Send => FIELD_SEND,
            Self::End => FIELD_END
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::IdsSmtpd => "ids_smtpd",
            Self::IdsPickup => "ids_pickup",
            Self::IdsCleanup => "ids_cleanup",
            Self::IdsOpenDkim => "ids_opendkim",
            Self::IdsQmgr => "ids_qmgr",
            Self::Scope => "scope",
            Self::Source => "source",
            Self::From => "from",
            Self::Send => "send",
            Self::End => "end"
        }
    }
}

/// Values spliced into a template.
///
/// `server` and `search` go in verbatim (they may be regex fragments); the
/// queue id and daemon names are always escaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateParams<'a> {
    pub server: &'a str,
    pub search: &'a str,
    pub queue_id: Option<&'a QueueId>
}

/// Substitutes every placeholder of `template` in a single left-to-right
/// pass, so text coming from the caller is never re-scanned for
/// placeholders.
pub fn render(
    template: Template,
    params: &TemplateParams<'_>
) -> Result<String, CorrelateError> {
    let source = template.pattern();
    let mut out = String::with_capacity(source.len() + 64);
    let mut rest = source;

    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];

        match placeholder_value(tail, params, template)? {
            Some((token_len, value)) => {
                out.push_str(&value);
                rest = &tail[token_len..];
            }
            None => {
                out.push('@');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    Ok(out)
}

fn placeholder_value(
    tail: &str,
    params: &TemplateParams<'_>,
    template: Template
) -> Result<Option<(usize, String)>, CorrelateError> {
    let daemons = [
        (PLACEHOLDER_DAEMON_SMTPD, Daemon::Smtpd),
        (PLACEHOLDER_DAEMON_PICKUP, Daemon::Pickup),
        (PLACEHOLDER_DAEMON_CLEANUP, Daemon::Cleanup),
        (PLACEHOLDER_DAEMON_OPENDKIM, Daemon::OpenDkim),
        (PLACEHOLDER_DAEMON_QMGR, Daemon::Qmgr),
    ];
    for (token, daemon) in daemons {
        if tail.starts_with(token) {
            return Ok(Some((token.len(), regex::escape(daemon.literal()))));
        }
    }

    if tail.starts_with(PLACEHOLDER_DAEMON_DELIVERY) {
        let agents = DELIVERY_AGENTS
            .iter()
            .map(|agent| regex::escape(agent))
            .collect::<Vec<_>>()
            .join("|");
        return Ok(Some((PLACEHOLDER_DAEMON_DELIVERY.len(), agents)));
    }
    if tail.starts_with(PLACEHOLDER_SERVER) {
        return Ok(Some((PLACEHOLDER_SERVER.len(), params.server.to_string())));
    }
    if tail.starts_with(PLACEHOLDER_SEARCH) {
        return Ok(Some((PLACEHOLDER_SEARCH.len(), params.search.to_string())));
    }
    if tail.starts_with(PLACEHOLDER_ID) {
        let queue_id = params.queue_id.ok_or_else(|| {
            CorrelateError::invalid(format!(
                "template {} requires a queue id",
                template.name()
            ))
        })?;
        return Ok(Some((PLACEHOLDER_ID.len(), regex::escape(queue_id.as_str()))));
    }

    Ok(None)
}

/// Compiled line grammar. Built fresh per parameter set and never mutated.
#[derive(Debug, Clone)]
pub struct LineMatcher {
    regex: Regex
}

impl LineMatcher {
    pub fn is_match(
        &self,
        line: &str
    ) -> bool {
        self.regex.is_match(line)
    }

    pub fn captures<'l>(
        &self,
        line: &'l str
    ) -> Option<Captures<'l>> {
        self.regex.captures(line)
    }

    /// Returns the named group of the first match, if both exist.
    pub fn capture<'l>(
        &self,
        line: &'l str,
        group: &str
    ) -> Option<&'l str> {
        self.regex.captures(line)?.name(group).map(|m| m.as_str())
    }
}

pub fn build_matcher(
    template: Template,
    params: &TemplateParams<'_>
) -> Result<LineMatcher, CorrelateError> {
    let pattern = render(template, params)?;
    let regex = Regex::new(&pattern).map_err(|err| {
        CorrelateError::invalid(format!(
            "template {} does not compile with server={:?}, search={:?}: {err}",
            template.name(),
            params.server,
            params.search
        ))
    })?;

    Ok(LineMatcher { regex })
}
