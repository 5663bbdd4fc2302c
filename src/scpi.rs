use crate::communicator::Communicator;
use crate::decode::{decode, DecodeError, TextResponse};
use crate::registers::{
    extract_bits, or_of_bits, RegisterError, STANDARD_EVENT_REGISTER, STATUS_BYTE_REGISTER,
};
use crate::transport::TransportError;

/// Whether a command token expects a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Command,
    Query,
}

/// One IEEE-488.2 common command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Wire token, e.g. `"*IDN?"`.
    pub token: &'static str,
    pub direction: Direction,
    /// Verbose method-style name, e.g. `"identification_query"`.
    pub name: &'static str,
    pub summary: &'static str,
}

/// The fixed IEEE-488.2 common-command table. Tokens and verbose names are
/// stable; devices narrow it with [`ScpiSubset::Only`].
pub static COMMON_COMMANDS: [CommandSpec; 19] = [
    CommandSpec {
        token: "*CLS",
        direction: Direction::Command,
        name: "clear_status",
        summary: "Clear the status byte and the event registers summarized in it",
    },
    CommandSpec {
        token: "*ESE",
        direction: Direction::Command,
        name: "standard_event_status_enable",
        summary: "Set the standard event status enable register",
    },
    CommandSpec {
        token: "*ESE?",
        direction: Direction::Query,
        name: "standard_event_status_enable_query",
        summary: "Query the standard event status enable register",
    },
    CommandSpec {
        token: "*ESR?",
        direction: Direction::Query,
        name: "standard_event_status_register_query",
        summary: "Query the standard event status register (destructive read)",
    },
    CommandSpec {
        token: "*IDN?",
        direction: Direction::Query,
        name: "identification_query",
        summary: "Query the model, serial number and firmware revision",
    },
    CommandSpec {
        token: "*LRN?",
        direction: Direction::Query,
        name: "learn_device_setup_query",
        summary: "Query the instrument settings as a replayable setup block",
    },
    CommandSpec {
        token: "*OPC",
        direction: Direction::Command,
        name: "operation_complete",
        summary: "Set the operation-complete bit once pending operations finish",
    },
    CommandSpec {
        token: "*OPC?",
        direction: Direction::Query,
        name: "operation_complete_query",
        summary: "Reply '1' when all pending operations have finished",
    },
    CommandSpec {
        token: "*PSC",
        direction: Direction::Command,
        name: "power_on_status_clear",
        summary: "Turn clearing of the enable registers at power on on or off",
    },
    CommandSpec {
        token: "*PSC?",
        direction: Direction::Query,
        name: "power_on_status_clear_query",
        summary: "Query the power-on status clear setting",
    },
    CommandSpec {
        token: "*RCL",
        direction: Direction::Command,
        name: "recall",
        summary: "Recall a complete instrument setting from memory",
    },
    CommandSpec {
        token: "*RST",
        direction: Direction::Command,
        name: "reset",
        summary: "Reset the instrument to its factory-defined condition",
    },
    CommandSpec {
        token: "*SAV",
        direction: Direction::Command,
        name: "save",
        summary: "Save the complete instrument setting to memory",
    },
    CommandSpec {
        token: "*SRE",
        direction: Direction::Command,
        name: "service_request_enable",
        summary: "Set the service request enable register",
    },
    CommandSpec {
        token: "*SRE?",
        direction: Direction::Query,
        name: "service_request_enable_query",
        summary: "Query the service request enable register",
    },
    CommandSpec {
        token: "*STB?",
        direction: Direction::Query,
        name: "read_status_byte_query",
        summary: "Query the status byte (non-destructive read)",
    },
    CommandSpec {
        token: "*TRG",
        direction: Direction::Command,
        name: "trigger",
        summary: "Trigger the device when bus triggering is selected",
    },
    CommandSpec {
        token: "*TST?",
        direction: Direction::Query,
        name: "self_test",
        summary: "Query the result of the power-up self-test",
    },
    CommandSpec {
        token: "*WAI",
        direction: Direction::Command,
        name: "wait_to_continue",
        summary: "Wait until all pending commands complete before continuing",
    },
];

/// Terse alias of a wire token: every `*` stripped, a trailing `?`
/// replaced with `Q`. `*IDN?` becomes `IDNQ`, `*CLS` becomes `CLS`.
pub fn terse_alias(token: &str) -> String {
    let bare: String = token.chars().filter(|c| *c != '*').collect();
    match bare.strip_suffix('?') {
        Some(stem) => format!("{stem}Q"),
        None => bare,
    }
}

/// Which of the common commands a device implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScpiSubset {
    /// Every command in the fixed table.
    All,
    /// Only the listed wire tokens.
    Only(&'static [&'static str]),
}

/// The resolved, immutable command set of one device.
#[derive(Debug, Clone)]
pub struct ScpiTable {
    entries: Vec<&'static CommandSpec>,
}

impl ScpiTable {
    /// Resolve a subset against the fixed table. A token outside the table
    /// fails here, before any I/O, and the subset's order is preserved.
    pub fn resolve(subset: ScpiSubset) -> Result<Self, ScpiError> {
        let entries = match subset {
            ScpiSubset::All => COMMON_COMMANDS.iter().collect(),
            ScpiSubset::Only(tokens) => {
                let mut entries = Vec::with_capacity(tokens.len());
                for token in tokens {
                    let spec = COMMON_COMMANDS
                        .iter()
                        .find(|spec| spec.token == *token)
                        .ok_or_else(|| ScpiError::UnknownToken {
                            token: (*token).to_string(),
                        })?;
                    entries.push(spec);
                }
                entries
            }
        };
        Ok(Self { entries })
    }

    /// Look an enabled command up by verbose name or terse alias. Wire
    /// tokens themselves are not names.
    pub fn lookup(&self, name: &str) -> Option<&'static CommandSpec> {
        self.entries
            .iter()
            .copied()
            .find(|spec| spec.name == name || terse_alias(spec.token) == name)
    }

    /// Enabled commands in subset order.
    pub fn entries(&self) -> impl Iterator<Item = &'static CommandSpec> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn lookup_full(name: &str) -> Option<&'static CommandSpec> {
    COMMON_COMMANDS
        .iter()
        .find(|spec| spec.name == name || terse_alias(spec.token) == name)
}

#[derive(Debug, thiserror::Error)]
pub enum ScpiError {
    #[error("Token '{token}' is not an IEEE-488.2 common command")]
    UnknownToken { token: String },

    #[error("No command named '{name}'")]
    UnknownCommand { name: String },

    #[error("Command '{token}' is not enabled for this device")]
    NotEnabled { token: String },

    #[error("Expected an 8-bit register value, got '{reply}'")]
    BadRegisterReply { reply: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Register error: {0}")]
    Register(#[from] RegisterError),
}

/// An IEEE-488.2 session: a communicator plus the device's resolved
/// command table.
///
/// Commands are invoked by verbose name or terse alias; the wire token is
/// an implementation detail. Calling a name whose token is outside the
/// device's subset fails with [`ScpiError::NotEnabled`].
///
/// ```
/// use labwire::{Communicator, MockTransport, ScpiClient, ScpiSubset};
///
/// let mut mock = MockTransport::new();
/// mock.push_response(b"Keithley,3390,1.0\n".to_vec());
///
/// let mut com = Communicator::new(Box::new(mock));
/// com.open()?;
/// let mut scpi = ScpiClient::new(com, ScpiSubset::All)?;
/// assert_eq!(scpi.identify()?, "Keithley,3390,1.0");
/// # Ok::<(), labwire::ScpiError>(())
/// ```
pub struct ScpiClient {
    com: Communicator,
    table: ScpiTable,
}

impl ScpiClient {
    pub fn new(com: Communicator, subset: ScpiSubset) -> Result<Self, ScpiError> {
        Ok(Self {
            com,
            table: ScpiTable::resolve(subset)?,
        })
    }

    pub fn table(&self) -> &ScpiTable {
        &self.table
    }

    pub fn communicator_mut(&mut self) -> &mut Communicator {
        &mut self.com
    }

    fn entry(&self, name: &str) -> Result<&'static CommandSpec, ScpiError> {
        if let Some(spec) = self.table.lookup(name) {
            return Ok(spec);
        }
        match lookup_full(name) {
            Some(spec) => Err(ScpiError::NotEnabled {
                token: spec.token.to_string(),
            }),
            None => Err(ScpiError::UnknownCommand {
                name: name.to_string(),
            }),
        }
    }

    /// Run a command by verbose name or terse alias. Queries return the
    /// decoded reply with terminators and surrounding whitespace stripped;
    /// plain commands return `None`.
    pub fn call(&mut self, name: &str) -> Result<Option<TextResponse>, ScpiError> {
        self.call_with(name, &[])
    }

    /// Like [`call`](Self::call), with space-joined arguments after the
    /// token.
    pub fn call_with(
        &mut self,
        name: &str,
        args: &[&str],
    ) -> Result<Option<TextResponse>, ScpiError> {
        let spec = self.entry(name)?;
        let msg = if args.is_empty() {
            spec.token.to_string()
        } else {
            format!("{} {}", spec.token, args.join(" "))
        };
        match spec.direction {
            Direction::Command => {
                self.com.send(&msg)?;
                Ok(None)
            }
            Direction::Query => {
                let raw = self.com.query(&msg)?;
                let text = decode(raw)?;
                Ok(Some(trim_reply(text, self.com.terminator())))
            }
        }
    }

    /// `*IDN?`
    pub fn identify(&mut self) -> Result<String, ScpiError> {
        let reply = self.query_text("identification_query")?;
        Ok(reply.first_line().to_string())
    }

    /// `*ESR?`, reported as the names of the set bits.
    pub fn standard_event_flags(&mut self) -> Result<Vec<&'static str>, ScpiError> {
        let value = self.query_register("standard_event_status_register_query")?;
        Ok(extract_bits(value, &STANDARD_EVENT_REGISTER))
    }

    /// `*ESE?`, reported as the names of the enabled bits.
    pub fn enabled_event_flags(&mut self) -> Result<Vec<&'static str>, ScpiError> {
        let value = self.query_register("standard_event_status_enable_query")?;
        Ok(extract_bits(value, &STANDARD_EVENT_REGISTER))
    }

    /// `*STB?`, reported as the names of the set bits.
    pub fn status_byte_flags(&mut self) -> Result<Vec<&'static str>, ScpiError> {
        let value = self.query_register("read_status_byte_query")?;
        Ok(extract_bits(value, &STATUS_BYTE_REGISTER))
    }

    /// `*ESE` with an OR-composed mask. A single mask passes through
    /// unchanged; an empty slice is rejected.
    pub fn set_event_status_enable(&mut self, bits: &[u8]) -> Result<(), ScpiError> {
        let mask = compose_mask(bits)?;
        self.call_with("standard_event_status_enable", &[&mask.to_string()])?;
        Ok(())
    }

    /// `*SRE` with an OR-composed mask.
    pub fn set_service_request_enable(&mut self, bits: &[u8]) -> Result<(), ScpiError> {
        let mask = compose_mask(bits)?;
        self.call_with("service_request_enable", &[&mask.to_string()])?;
        Ok(())
    }

    fn query_text(&mut self, name: &str) -> Result<TextResponse, ScpiError> {
        // Callers only name queries, which always produce a reply.
        let reply = self.call(name)?;
        Ok(reply.expect("query produced no reply"))
    }

    fn query_register(&mut self, name: &str) -> Result<u8, ScpiError> {
        let reply = self.query_text(name)?;
        let line = reply.first_line();
        line.parse::<u8>().map_err(|_| ScpiError::BadRegisterReply {
            reply: line.to_string(),
        })
    }
}

fn compose_mask(bits: &[u8]) -> Result<u8, RegisterError> {
    match bits {
        [single] => Ok(*single),
        _ => or_of_bits(bits),
    }
}

fn trim_reply(text: TextResponse, terminator: &str) -> TextResponse {
    match text {
        TextResponse::Line(line) => TextResponse::Line(clean(&line, terminator)),
        TextResponse::Lines(lines) => {
            TextResponse::Lines(lines.iter().map(|line| clean(line, terminator)).collect())
        }
    }
}

fn clean(line: &str, terminator: &str) -> String {
    let body = line.strip_suffix(terminator).unwrap_or(line);
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn client_over(mock: MockTransport, subset: ScpiSubset) -> ScpiClient {
        let mut com = Communicator::new(Box::new(mock));
        com.open().unwrap();
        ScpiClient::new(com, subset).unwrap()
    }

    #[test]
    fn test_terse_alias_rules() {
        assert_eq!(terse_alias("*IDN?"), "IDNQ");
        assert_eq!(terse_alias("*ESE?"), "ESEQ");
        assert_eq!(terse_alias("*CLS"), "CLS");
        assert_eq!(terse_alias("*WAI"), "WAI");
    }

    #[test]
    fn test_table_tokens_and_names_are_unique() {
        for (i, a) in COMMON_COMMANDS.iter().enumerate() {
            for b in &COMMON_COMMANDS[i + 1..] {
                assert_ne!(a.token, b.token);
                assert_ne!(a.name, b.name);
                assert_ne!(terse_alias(a.token), terse_alias(b.token));
            }
        }
    }

    #[test]
    fn test_query_direction_matches_token() {
        for spec in &COMMON_COMMANDS {
            assert_eq!(spec.token.ends_with('?'), spec.direction == Direction::Query);
        }
    }

    #[test]
    fn test_resolve_all() {
        let table = ScpiTable::resolve(ScpiSubset::All).unwrap();
        assert_eq!(table.len(), 19);
    }

    #[test]
    fn test_resolve_preserves_subset_order() {
        let table = ScpiTable::resolve(ScpiSubset::Only(&["*RST", "*CLS", "*IDN?"])).unwrap();
        let tokens: Vec<_> = table.entries().map(|spec| spec.token).collect();
        assert_eq!(tokens, vec!["*RST", "*CLS", "*IDN?"]);
    }

    #[test]
    fn test_resolve_rejects_unknown_token() {
        let err = ScpiTable::resolve(ScpiSubset::Only(&["*IDN?", "*BOGUS"])).unwrap_err();
        assert!(matches!(err, ScpiError::UnknownToken { .. }));
    }

    #[test]
    fn test_lookup_by_both_names_only() {
        let table = ScpiTable::resolve(ScpiSubset::All).unwrap();
        assert!(table.lookup("identification_query").is_some());
        assert!(table.lookup("IDNQ").is_some());
        // The wire token is not a lookup name.
        assert!(table.lookup("*IDN?").is_none());
    }

    #[test]
    fn test_call_sends_the_wire_token() {
        let mock = MockTransport::new();
        let journal = mock.journal();
        let mut scpi = client_over(mock, ScpiSubset::All);

        scpi.call("clear_status").unwrap();
        scpi.call("CLS").unwrap();
        assert_eq!(journal.lines(), vec!["*CLS", "*CLS"]);
        assert_eq!(journal.frames()[0], b"*CLS\n");
    }

    #[test]
    fn test_call_with_joins_arguments() {
        let mut mock = MockTransport::new();
        let journal = mock.journal();
        mock.push_response(b"1\n".to_vec());
        let mut scpi = client_over(mock, ScpiSubset::All);

        scpi.call_with("recall", &["3"]).unwrap();
        let reply = scpi.call("operation_complete_query").unwrap();
        assert_eq!(reply.unwrap().first_line(), "1");
        assert_eq!(journal.lines(), vec!["*RCL 3", "*OPC?"]);
    }

    #[test]
    fn test_query_reply_is_trimmed() {
        let mut mock = MockTransport::new();
        mock.push_response(b"  Keithley,3390,1.0\n".to_vec());
        let mut scpi = client_over(mock, ScpiSubset::All);
        assert_eq!(scpi.identify().unwrap(), "Keithley,3390,1.0");
    }

    #[test]
    fn test_disabled_command_is_gated() {
        let mut scpi = client_over(MockTransport::new(), ScpiSubset::Only(&["*CLS", "*RST"]));
        scpi.call("reset").unwrap();

        let err = scpi.call("identification_query").unwrap_err();
        assert!(matches!(err, ScpiError::NotEnabled { .. }));
        let err = scpi.call("IDNQ").unwrap_err();
        assert!(matches!(err, ScpiError::NotEnabled { .. }));
    }

    #[test]
    fn test_unknown_name_is_distinguished_from_disabled() {
        let mut scpi = client_over(MockTransport::new(), ScpiSubset::Only(&["*CLS"]));
        let err = scpi.call("warp_drive").unwrap_err();
        assert!(matches!(err, ScpiError::UnknownCommand { .. }));
    }

    #[test]
    fn test_standard_event_flags_decodes_register() {
        let mut mock = MockTransport::new();
        mock.push_response(b"33\n".to_vec());
        let mut scpi = client_over(mock, ScpiSubset::All);
        assert_eq!(
            scpi.standard_event_flags().unwrap(),
            vec!["Operation Complete", "Command Error"]
        );
    }

    #[test]
    fn test_bad_register_reply_is_an_error() {
        let mut mock = MockTransport::new();
        mock.push_response(b"garbage\n".to_vec());
        let mut scpi = client_over(mock, ScpiSubset::All);
        assert!(matches!(
            scpi.standard_event_flags(),
            Err(ScpiError::BadRegisterReply { .. })
        ));
    }

    #[test]
    fn test_set_event_status_enable_composes_mask() {
        let mock = MockTransport::new();
        let journal = mock.journal();
        let mut scpi = client_over(mock, ScpiSubset::All);

        scpi.set_event_status_enable(&[0x10, 0x20]).unwrap();
        scpi.set_event_status_enable(&[0x01]).unwrap();
        assert_eq!(journal.lines(), vec!["*ESE 48", "*ESE 1"]);
        assert!(matches!(
            scpi.set_event_status_enable(&[]),
            Err(ScpiError::Register(RegisterError::NotEnoughBits { got: 0 }))
        ));
    }
}
