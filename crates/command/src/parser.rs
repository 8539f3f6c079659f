//! Parsing `describe` commands back into field definitions.
//!
//! Every command has the shape `<type> field <name> (<param> <value>...)*`,
//! exactly as [`Field::describe`] prints it. Parameters are read in the
//! order `describe` writes them; names are resolved against the module and
//! the curve and time keeper managers when the command is parsed.

use fieldgraph_core::{Curve, Manager, NodeId, TimeKeeper};
use fieldgraph_engine::{
    AddCore, ConstantCore, CoordinateSystem, CoordinateTransformationCore, CurveLookupCore, Field, FieldCore,
    ImageFilter, LogicalOp, Module, NodeValueCore, OffsetCore, ScaleCore, ThresholdMode, TimeValueCore,
};
use tracing::debug;

use crate::error::CommandError;
use crate::tokenize::tokenize;

/// A parsed command: what [`Module::define_field`] needs.
#[derive(Debug)]
pub struct ParsedCommand {
    pub name: String,
    pub core: FieldCore,
    pub sources: Vec<Field>,
}

/// Turns command strings into fields of one module.
pub struct CommandParser<'a> {
    module: &'a Module,
    curves: &'a Manager<Curve>,
    time_keepers: &'a Manager<TimeKeeper>,
}

impl<'a> CommandParser<'a> {
    pub fn new(module: &'a Module, curves: &'a Manager<Curve>, time_keepers: &'a Manager<TimeKeeper>) -> Self {
        Self {
            module,
            curves,
            time_keepers,
        }
    }

    /// Parse one command without touching the module.
    pub fn parse_core(&self, line: &str) -> Result<ParsedCommand, CommandError> {
        let tokens = tokenize(line)?;
        let mut cursor = Cursor::new(&tokens);
        let kind = cursor.word("field type")?;
        cursor.expect("field")?;
        let name = cursor.word("field name")?.to_string();
        let (core, sources) = self.parse_body(kind, &mut cursor)?;
        cursor.finish()?;
        Ok(ParsedCommand { name, core, sources })
    }

    /// Parse one command and create or redefine the field it names.
    pub fn execute(&self, line: &str) -> Result<Field, CommandError> {
        let parsed = self.parse_core(line)?;
        let field = self
            .module
            .define_field(&parsed.name, parsed.core, &parsed.sources)?;
        debug!(field = %parsed.name, kind = field.core_type(), "Executed command");
        Ok(field)
    }

    /// Execute commands in order, skipping blank and comment-only lines.
    /// Parse errors report the 1-based position of the failing command.
    pub fn execute_all<S: AsRef<str>>(&self, commands: &[S]) -> Result<Vec<Field>, CommandError> {
        let mut fields = Vec::new();
        for (index, command) in commands.iter().enumerate() {
            let line = command.as_ref();
            if tokenize(line).map_err(|e| e.at_line(index + 1))?.is_empty() {
                continue;
            }
            fields.push(self.execute(line).map_err(|e| e.at_line(index + 1))?);
        }
        Ok(fields)
    }

    // ── Bodies ─────────────────────────────────────────────────────────────

    fn parse_body(&self, kind: &str, cursor: &mut Cursor<'_>) -> Result<(FieldCore, Vec<Field>), CommandError> {
        if let Some(op) = LogicalOp::from_token(kind) {
            let sources = self.field_pair(cursor)?;
            return Ok((FieldCore::Logical(op), sources));
        }
        let parsed = match kind {
            "constant" => {
                cursor.expect("values")?;
                let values = cursor.numbers();
                (FieldCore::Constant(ConstantCore::new(values)?), Vec::new())
            }
            "xi" => (FieldCore::Xi, Vec::new()),
            "node_value" => (FieldCore::NodeValue(node_values(cursor)?), Vec::new()),
            "time_value" => {
                let name = cursor.keyword_word("time_keeper")?;
                let keeper = self
                    .time_keepers
                    .get(name)
                    .ok_or_else(|| CommandError::UnknownTimeKeeper(name.to_string()))?;
                (FieldCore::TimeValue(TimeValueCore::new(&keeper)), Vec::new())
            }
            "add" => {
                let sources = self.field_pair(cursor)?;
                let core = if cursor.accept("scale_factors") {
                    let weights = cursor.exact_numbers(2, "scale_factors")?;
                    AddCore::new(weights[0], weights[1])
                } else {
                    AddCore::default()
                };
                (FieldCore::Add(core), sources)
            }
            "multiply" => (FieldCore::Multiply, self.field_pair(cursor)?),
            "divide" => (FieldCore::Divide, self.field_pair(cursor)?),
            "scale" => {
                let source = self.keyword_field(cursor, "field")?;
                cursor.expect("scale_factors")?;
                (FieldCore::Scale(ScaleCore::new(cursor.numbers())?), vec![source])
            }
            "offset" => {
                let source = self.keyword_field(cursor, "field")?;
                cursor.expect("offsets")?;
                (FieldCore::Offset(OffsetCore::new(cursor.numbers())?), vec![source])
            }
            "not" => (FieldCore::Not, vec![self.keyword_field(cursor, "field")?]),
            "curve_lookup" => {
                let name = cursor.keyword_word("curve")?;
                let curve = self
                    .curves
                    .get(name)
                    .ok_or_else(|| CommandError::UnknownCurve(name.to_string()))?;
                let source = self.keyword_field(cursor, "source_field")?;
                (FieldCore::CurveLookup(CurveLookupCore::new(&curve)), vec![source])
            }
            "time_lookup" => {
                let source = self.keyword_field(cursor, "source_field")?;
                let time = self.keyword_field(cursor, "time_field")?;
                (FieldCore::TimeLookup, vec![source, time])
            }
            "function" => {
                let source = self.keyword_field(cursor, "source_field")?;
                let result = self.keyword_field(cursor, "result_field")?;
                let reference = self.keyword_field(cursor, "reference_field")?;
                (FieldCore::Function, vec![source, result, reference])
            }
            "coordinate_transformation" => {
                let source = self.keyword_field(cursor, "field")?;
                let from = coordinate_system(cursor.keyword_word("from")?)?;
                let to = coordinate_system(cursor.keyword_word("to")?)?;
                let core = CoordinateTransformationCore::new(from, to);
                (FieldCore::CoordinateTransformation(core), vec![source])
            }
            "compose" => {
                let texture = self.keyword_field(cursor, "texture_coordinates_field")?;
                let find = self.keyword_field(cursor, "find_element_xi_field")?;
                let calculate = self.keyword_field(cursor, "calculate_values_field")?;
                (FieldCore::Compose, vec![texture, find, calculate])
            }
            "binary_threshold_filter" => {
                let source = self.keyword_field(cursor, "field")?;
                let lower = cursor.keyword_number("lower_threshold")?;
                let upper = cursor.keyword_number("upper_threshold")?;
                let filter = ImageFilter::binary_threshold(lower, upper)?;
                (FieldCore::ImageFilter(filter), vec![source])
            }
            "threshold_filter" => {
                let source = self.keyword_field(cursor, "field")?;
                let mode_token = cursor.keyword_word("mode")?;
                let mode = ThresholdMode::from_token(mode_token)
                    .ok_or_else(|| CommandError::parse(format!("unknown threshold mode '{mode_token}'")))?;
                let outside = cursor.keyword_number("outside_value")?;
                let below = cursor.keyword_number("below_value")?;
                let above = cursor.keyword_number("above_value")?;
                let filter = ImageFilter::threshold(mode, outside, below, above)?;
                (FieldCore::ImageFilter(filter), vec![source])
            }
            "sigmoid_filter" => {
                let source = self.keyword_field(cursor, "field")?;
                let minimum = cursor.keyword_number("minimum")?;
                let maximum = cursor.keyword_number("maximum")?;
                let alpha = cursor.keyword_number("alpha")?;
                let beta = cursor.keyword_number("beta")?;
                let filter = ImageFilter::sigmoid(minimum, maximum, alpha, beta)?;
                (FieldCore::ImageFilter(filter), vec![source])
            }
            other => return Err(CommandError::parse(format!("unknown field type '{other}'"))),
        };
        Ok(parsed)
    }

    fn field(&self, name: &str) -> Result<Field, CommandError> {
        self.module
            .find_field_by_name(name)
            .ok_or_else(|| CommandError::UnknownField(name.to_string()))
    }

    fn keyword_field(&self, cursor: &mut Cursor<'_>, keyword: &str) -> Result<Field, CommandError> {
        self.field(cursor.keyword_word(keyword)?)
    }

    /// `fields <a> <b>`
    fn field_pair(&self, cursor: &mut Cursor<'_>) -> Result<Vec<Field>, CommandError> {
        cursor.expect("fields")?;
        let a = self.field(cursor.word("first source field")?)?;
        let b = self.field(cursor.word("second source field")?)?;
        Ok(vec![a, b])
    }
}

/// `component_count N (node <id> [time <t>] <v1..vN>)*`
fn node_values(cursor: &mut Cursor<'_>) -> Result<NodeValueCore, CommandError> {
    let count = cursor.keyword_word("component_count")?;
    let count: usize = count
        .parse()
        .map_err(|_| CommandError::parse(format!("invalid component count '{count}'")))?;
    let mut core = NodeValueCore::new(count)?;
    while cursor.accept("node") {
        let id = cursor.word("node id")?;
        let id: u32 = id
            .parse()
            .map_err(|_| CommandError::parse(format!("invalid node id '{id}'")))?;
        if cursor.accept("time") {
            let time = cursor.number("sample time")?;
            let values = cursor.exact_numbers(count, "node values")?;
            core.set_at_time(NodeId(id), time, values)?;
        } else {
            let values = cursor.exact_numbers(count, "node values")?;
            core.set(NodeId(id), values)?;
        }
    }
    Ok(core)
}

fn coordinate_system(token: &str) -> Result<CoordinateSystem, CommandError> {
    CoordinateSystem::from_token(token)
        .ok_or_else(|| CommandError::parse(format!("unknown coordinate system '{token}'")))
}

// ── Token cursor ───────────────────────────────────────────────────────────

struct Cursor<'t> {
    tokens: &'t [String],
    position: usize,
}

impl<'t> Cursor<'t> {
    fn new(tokens: &'t [String]) -> Self {
        Self { tokens, position: 0 }
    }

    fn peek(&self) -> Option<&'t str> {
        self.tokens.get(self.position).map(String::as_str)
    }

    fn word(&mut self, what: &str) -> Result<&'t str, CommandError> {
        let token = self
            .peek()
            .ok_or_else(|| CommandError::parse(format!("expected {what}, found end of command")))?;
        self.position += 1;
        Ok(token)
    }

    fn accept(&mut self, keyword: &str) -> bool {
        if self.peek() == Some(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, keyword: &str) -> Result<(), CommandError> {
        match self.peek() {
            Some(token) if token == keyword => {
                self.position += 1;
                Ok(())
            }
            Some(token) => Err(CommandError::parse(format!("expected '{keyword}', found '{token}'"))),
            None => Err(CommandError::parse(format!("expected '{keyword}', found end of command"))),
        }
    }

    fn keyword_word(&mut self, keyword: &str) -> Result<&'t str, CommandError> {
        self.expect(keyword)?;
        self.word(keyword)
    }

    fn number(&mut self, what: &str) -> Result<f64, CommandError> {
        let token = self.word(what)?;
        token
            .parse()
            .map_err(|_| CommandError::parse(format!("invalid number '{token}' for {what}")))
    }

    fn keyword_number(&mut self, keyword: &str) -> Result<f64, CommandError> {
        self.expect(keyword)?;
        self.number(keyword)
    }

    /// Consume numbers until the next token is not one.
    fn numbers(&mut self) -> Vec<f64> {
        let mut values = Vec::new();
        while let Some(value) = self.peek().and_then(|t| t.parse::<f64>().ok()) {
            values.push(value);
            self.position += 1;
        }
        values
    }

    fn exact_numbers(&mut self, count: usize, what: &str) -> Result<Vec<f64>, CommandError> {
        (0..count).map(|_| self.number(what)).collect()
    }

    fn finish(&self) -> Result<(), CommandError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(CommandError::parse(format!("unexpected trailing token '{token}'"))),
        }
    }
}
