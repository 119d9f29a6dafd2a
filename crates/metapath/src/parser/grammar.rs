use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit0, digit1, satisfy},
    combinator::{map, not, opt, peek, recognize, value},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
};

use crate::error::MetapathError;

use super::{ParseNode, Rule};

type ParseResult<'a, O> = IResult<&'a str, O>;

/// Names that look like function calls but are syntax.
const RESERVED_FUNCTION_NAMES: [&str; 14] = [
    "array",
    "assembly",
    "document-node",
    "empty-sequence",
    "field",
    "flag",
    "function",
    "if",
    "item",
    "map",
    "node",
    "switch",
    "typeswitch",
    "for",
];

pub(super) fn finish(text: &str, result: ParseResult<'_, ParseNode>) -> Result<ParseNode, MetapathError> {
    match result {
        Ok(("", node)) => Ok(node),
        Ok((rest, _)) => Err(unexpected(text, rest)),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(unexpected(text, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(MetapathError::syntax(format!(
            "incomplete expression '{text}'"
        ))),
    }
}

fn unexpected(text: &str, rest: &str) -> MetapathError {
    let offset = text.len() - rest.len();
    if rest.is_empty() {
        MetapathError::syntax(format!("unexpected end of expression '{text}'"))
    } else {
        let near: String = rest.chars().take(20).collect();
        MetapathError::syntax(format!(
            "unexpected input at offset {offset} in '{text}' near '{near}'"
        ))
    }
}

fn fail<O>(input: &str, kind: ErrorKind) -> ParseResult<'_, O> {
    Err(nom::Err::Error(Error::new(input, kind)))
}

pub(super) fn expression(input: &str) -> ParseResult<'_, ParseNode> {
    terminated(expr, sp).parse(input)
}

pub(super) fn standalone_sequence_type(input: &str) -> ParseResult<'_, ParseNode> {
    terminated(sequence_type, sp).parse(input)
}

// --- Lexical helpers ---

/// Skips whitespace and `(: ... :)` comments, which nest.
fn sp(mut input: &str) -> ParseResult<'_, ()> {
    loop {
        let trimmed = input.trim_start();
        match trimmed.strip_prefix("(:") {
            Some(body) => input = skip_comment(body)?,
            None => return Ok((trimmed, ())),
        }
    }
}

fn skip_comment(input: &str) -> Result<&str, nom::Err<Error<&str>>> {
    let mut depth = 1usize;
    let mut rest = input;
    while depth > 0 {
        if let Some(after) = rest.strip_prefix(":)") {
            depth -= 1;
            rest = after;
        } else if let Some(after) = rest.strip_prefix("(:") {
            depth += 1;
            rest = after;
        } else {
            let mut chars = rest.chars();
            if chars.next().is_none() {
                return Err(nom::Err::Failure(Error::new(input, ErrorKind::Char)));
            }
            rest = chars.as_str();
        }
    }
    Ok(rest)
}

fn ws<'a, F, O>(inner: F) -> impl Parser<&'a str, Output = O, Error = Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = Error<&'a str>>,
{
    delimited(sp, inner, sp)
}

fn sym<'a>(symbol: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = Error<&'a str>> {
    ws(tag(symbol))
}

/// A reserved word not directly followed by a name character.
fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = Error<&'a str>> {
    ws(terminated(tag(word), not(satisfy(is_name_char))))
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn nc_name(input: &str) -> ParseResult<'_, &str> {
    recognize(pair(satisfy(is_name_start), take_while(is_name_char))).parse(input)
}

fn qname_str(input: &str) -> ParseResult<'_, &str> {
    recognize(pair(nc_name, opt(pair(char(':'), nc_name)))).parse(input)
}

fn braced_uri(input: &str) -> ParseResult<'_, &str> {
    recognize((tag("Q{"), take_while(|c| c != '}' && c != '{'), char('}'))).parse(input)
}

/// `Q{uri}local`, `prefix:local` or `local`.
fn eqname(input: &str) -> ParseResult<'_, &str> {
    alt((recognize(pair(braced_uri, nc_name)), qname_str)).parse(input)
}

fn is_reserved(name: &str) -> bool {
    RESERVED_FUNCTION_NAMES.contains(&name)
}

// --- Expressions ---

fn expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, mut items) = separated_list1(sym(","), expr_single).parse(input)?;
    let node = if items.len() == 1 {
        items.remove(0)
    } else {
        ParseNode::branch(Rule::Expr, items)
    };
    Ok((input, node))
}

fn expr_single(input: &str) -> ParseResult<'_, ParseNode> {
    alt((for_expr, let_expr, quantified_expr, if_expr, or_expr)).parse(input)
}

fn binding<'a>(
    separator: &'static str,
) -> impl Parser<&'a str, Output = ParseNode, Error = Error<&'a str>> {
    map(
        (sym("$"), eqname, ws(tag(separator)), expr_single),
        |(_, name, _, bound)| ParseNode::new(Rule::VarBinding, name, vec![bound]),
    )
}

fn for_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, _) = keyword("for").parse(input)?;
    let (input, mut children) = separated_list1(sym(","), binding("in")).parse(input)?;
    let (input, _) = keyword("return").parse(input)?;
    let (input, body) = expr_single(input)?;
    children.push(body);
    Ok((input, ParseNode::branch(Rule::For, children)))
}

fn let_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, _) = keyword("let").parse(input)?;
    let (input, mut children) = separated_list1(sym(","), binding(":=")).parse(input)?;
    let (input, _) = keyword("return").parse(input)?;
    let (input, body) = expr_single(input)?;
    children.push(body);
    Ok((input, ParseNode::branch(Rule::Let, children)))
}

fn quantified_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, quantifier) = alt((keyword("some"), keyword("every"))).parse(input)?;
    let (input, mut children) = separated_list1(sym(","), binding("in")).parse(input)?;
    let (input, _) = keyword("satisfies").parse(input)?;
    let (input, test) = expr_single(input)?;
    children.push(test);
    Ok((input, ParseNode::new(Rule::Quantified, quantifier, children)))
}

fn if_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, _) = keyword("if").parse(input)?;
    let (input, condition) = delimited(sym("("), expr, sym(")")).parse(input)?;
    let (input, _) = keyword("then").parse(input)?;
    let (input, then_branch) = expr_single(input)?;
    let (input, _) = keyword("else").parse(input)?;
    let (input, else_branch) = expr_single(input)?;
    Ok((
        input,
        ParseNode::branch(Rule::If, vec![condition, then_branch, else_branch]),
    ))
}

fn nary(rule: Rule, first: ParseNode, rest: Vec<ParseNode>) -> ParseNode {
    if rest.is_empty() {
        return first;
    }
    let mut children = Vec::with_capacity(rest.len() + 1);
    children.push(first);
    children.extend(rest);
    ParseNode::branch(rule, children)
}

fn left_assoc(rule: Rule, first: ParseNode, rest: Vec<(&str, ParseNode)>) -> ParseNode {
    rest.into_iter().fold(first, |left, (op, right)| {
        ParseNode::new(rule, op, vec![left, right])
    })
}

fn or_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(keyword("or"), and_expr)).parse(input)?;
    Ok((input, nary(Rule::Or, first, rest)))
}

fn and_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, first) = comparison_expr(input)?;
    let (input, rest) = many0(preceded(keyword("and"), comparison_expr)).parse(input)?;
    Ok((input, nary(Rule::And, first, rest)))
}

fn comparison_operator(input: &str) -> ParseResult<'_, &str> {
    alt((
        sym("<="),
        sym(">="),
        sym("!="),
        ws(terminated(tag("="), not(char('>')))),
        ws(terminated(tag("<"), not(char('<')))),
        ws(terminated(tag(">"), not(char('>')))),
        keyword("eq"),
        keyword("ne"),
        keyword("lt"),
        keyword("le"),
        keyword("gt"),
        keyword("ge"),
    ))
    .parse(input)
}

fn comparison_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, left) = string_concat_expr(input)?;
    let (input, rest) = opt(pair(comparison_operator, string_concat_expr)).parse(input)?;
    let node = match rest {
        Some((op, right)) => ParseNode::new(Rule::Comparison, op, vec![left, right]),
        None => left,
    };
    Ok((input, node))
}

fn string_concat_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, first) = range_expr(input)?;
    let (input, rest) = many0(preceded(sym("||"), range_expr)).parse(input)?;
    Ok((input, nary(Rule::StringConcat, first, rest)))
}

fn range_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, start) = additive_expr(input)?;
    let (input, end) = opt(preceded(keyword("to"), additive_expr)).parse(input)?;
    let node = match end {
        Some(end) => ParseNode::branch(Rule::Range, vec![start, end]),
        None => start,
    };
    Ok((input, node))
}

fn additive_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, first) = multiplicative_expr(input)?;
    let (input, rest) =
        many0(pair(alt((sym("+"), sym("-"))), multiplicative_expr)).parse(input)?;
    Ok((input, left_assoc(Rule::Arithmetic, first, rest)))
}

fn multiplicative_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, first) = union_expr(input)?;
    let (input, rest) = many0(pair(
        alt((sym("*"), keyword("div"), keyword("idiv"), keyword("mod"))),
        union_expr,
    ))
    .parse(input)?;
    Ok((input, left_assoc(Rule::Arithmetic, first, rest)))
}

fn union_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, first) = intersect_except_expr(input)?;
    let (input, rest) = many0(preceded(
        alt((keyword("union"), ws(terminated(tag("|"), not(char('|')))))),
        intersect_except_expr,
    ))
    .parse(input)?;
    Ok((input, nary(Rule::Union, first, rest)))
}

fn intersect_except_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, first) = instance_of_expr(input)?;
    let (input, rest) = many0(pair(
        alt((keyword("intersect"), keyword("except"))),
        instance_of_expr,
    ))
    .parse(input)?;
    Ok((input, left_assoc(Rule::IntersectExcept, first, rest)))
}

fn instance_of_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, operand) = treat_expr(input)?;
    let (input, of_type) =
        opt(preceded(pair(keyword("instance"), keyword("of")), sequence_type)).parse(input)?;
    let node = match of_type {
        Some(t) => ParseNode::branch(Rule::InstanceOf, vec![operand, t]),
        None => operand,
    };
    Ok((input, node))
}

fn treat_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, operand) = castable_expr(input)?;
    let (input, as_type) =
        opt(preceded(pair(keyword("treat"), keyword("as")), sequence_type)).parse(input)?;
    let node = match as_type {
        Some(t) => ParseNode::branch(Rule::Treat, vec![operand, t]),
        None => operand,
    };
    Ok((input, node))
}

fn castable_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, operand) = cast_expr(input)?;
    let (input, target) =
        opt(preceded(pair(keyword("castable"), keyword("as")), single_type)).parse(input)?;
    let node = match target {
        Some(t) => ParseNode::branch(Rule::Castable, vec![operand, t]),
        None => operand,
    };
    Ok((input, node))
}

fn cast_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, operand) = arrow_expr(input)?;
    let (input, target) =
        opt(preceded(pair(keyword("cast"), keyword("as")), single_type)).parse(input)?;
    let node = match target {
        Some(t) => ParseNode::branch(Rule::Cast, vec![operand, t]),
        None => operand,
    };
    Ok((input, node))
}

fn single_type(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, name) = ws(eqname).parse(input)?;
    let (input, optional) = opt(sym("?")).parse(input)?;
    let children = optional
        .map(|q| vec![ParseNode::leaf(Rule::Occurrence, q)])
        .unwrap_or_default();
    Ok((input, ParseNode::new(Rule::SingleType, name, children)))
}

fn arrow_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, base) = unary_expr(input)?;
    let (input, steps) = many0(preceded(sym("=>"), arrow_target)).parse(input)?;
    Ok((input, nary(Rule::Arrow, base, steps)))
}

fn arrow_target(input: &str) -> ParseResult<'_, ParseNode> {
    alt((
        map(pair(ws(eqname), argument_list), |(name, args)| {
            ParseNode::new(Rule::ArrowStaticCall, name, args)
        }),
        map(
            pair(alt((variable_reference, parenthesized_expr)), argument_list),
            |(target, args)| {
                let mut children = vec![target];
                children.extend(args);
                ParseNode::branch(Rule::ArrowDynamicCall, children)
            },
        ),
    ))
    .parse(input)
}

fn unary_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, signs) = many0(alt((sym("-"), sym("+")))).parse(input)?;
    let (input, operand) = simple_map_expr(input)?;
    if signs.is_empty() {
        return Ok((input, operand));
    }
    let negative = signs.iter().filter(|s| **s == "-").count() % 2 == 1;
    let sign = if negative { "-" } else { "+" };
    Ok((input, ParseNode::new(Rule::Unary, sign, vec![operand])))
}

fn simple_map_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, first) = path_expr(input)?;
    let (input, rest) =
        many0(preceded(ws(terminated(tag("!"), not(char('=')))), path_expr)).parse(input)?;
    Ok((input, nary(Rule::SimpleMap, first, rest)))
}

// --- Paths ---

fn path_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, _) = sp(input)?;
    if let Some(after) = input.strip_prefix("//") {
        let (after, relative) = relative_path(after)?;
        return Ok((after, ParseNode::branch(Rule::RootDoubleSlash, vec![relative])));
    }
    if let Some(after) = input.strip_prefix('/') {
        return match relative_path(after) {
            Ok((after, relative)) => Ok((after, ParseNode::branch(Rule::RootSlash, vec![relative]))),
            Err(nom::Err::Error(_)) => Ok((after, ParseNode::leaf(Rule::RootSlashOnly, "/"))),
            Err(e) => Err(e),
        };
    }
    relative_path(input)
}

fn relative_path(input: &str) -> ParseResult<'_, ParseNode> {
    let (mut input, mut path) = step_expr(input)?;
    loop {
        let (rest, _) = sp(input)?;
        let (rule, after) = if let Some(after) = rest.strip_prefix("//") {
            (Rule::RelativeDoubleSlash, after)
        } else if let Some(after) = rest.strip_prefix('/') {
            (Rule::RelativeSlash, after)
        } else {
            break;
        };
        match step_expr(after) {
            Ok((after, step)) => {
                path = ParseNode::branch(rule, vec![path, step]);
                input = after;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((input, path))
}

fn step_expr(input: &str) -> ParseResult<'_, ParseNode> {
    alt((postfix_expr, axis_step)).parse(input)
}

enum Postfix {
    Predicate(ParseNode),
    Arguments(Vec<ParseNode>),
    Lookup(ParseNode),
}

fn postfix_expr(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, base) = primary_expr(input)?;
    let (input, postfixes) = many0(alt((
        map(predicate, Postfix::Predicate),
        map(argument_list, Postfix::Arguments),
        map(preceded(sym("?"), key_specifier), Postfix::Lookup),
    )))
    .parse(input)?;
    let node = postfixes.into_iter().fold(base, |base, postfix| match postfix {
        Postfix::Predicate(p) => ParseNode::branch(Rule::Filter, vec![base, p]),
        Postfix::Arguments(args) => {
            let mut children = vec![base];
            children.extend(args);
            ParseNode::branch(Rule::DynamicCall, children)
        }
        Postfix::Lookup(key) => ParseNode::branch(Rule::Lookup, vec![base, key]),
    });
    Ok((input, node))
}

fn predicate(input: &str) -> ParseResult<'_, ParseNode> {
    map(delimited(sym("["), expr, sym("]")), |e| {
        ParseNode::branch(Rule::Predicate, vec![e])
    })
    .parse(input)
}

fn argument_list(input: &str) -> ParseResult<'_, Vec<ParseNode>> {
    delimited(sym("("), separated_list0(sym(","), expr_single), sym(")")).parse(input)
}

fn axis_name(input: &str) -> ParseResult<'_, &'static str> {
    terminated(
        alt((
            value("ancestor-or-self", tag("ancestor-or-self")),
            value("ancestor", tag("ancestor")),
            value("descendant-or-self", tag("descendant-or-self")),
            value("descendant", tag("descendant")),
            value("child", tag("child")),
            value("self", tag("self")),
            value("parent", tag("parent")),
            value("flag", tag("flag")),
        )),
        sym("::"),
    )
    .parse(input)
}

fn axis_step(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, _) = sp(input)?;
    let (input, (axis, test)) = alt((
        map(tag(".."), |_| ("parent", ParseNode::leaf(Rule::AnyKindTest, ""))),
        pair(axis_name, node_test),
        map(preceded(char('@'), node_test), |test| ("flag", test)),
        map(node_test, |test| ("child", test)),
    ))
    .parse(input)?;
    let (input, predicates) = many0(predicate).parse(input)?;
    let mut children = vec![test];
    children.extend(predicates);
    Ok((input, ParseNode::new(Rule::AxisStep, axis, children)))
}

fn node_test(input: &str) -> ParseResult<'_, ParseNode> {
    alt((kind_test, name_test)).parse(input)
}

fn name_test(input: &str) -> ParseResult<'_, ParseNode> {
    map(
        ws(alt((
            recognize(pair(braced_uri, alt((tag("*"), nc_name)))),
            recognize(pair(tag("*:"), nc_name)),
            recognize(pair(nc_name, tag(":*"))),
            tag("*"),
            qname_str,
        ))),
        |text| ParseNode::leaf(Rule::NameTest, text),
    )
    .parse(input)
}

fn name_or_wildcard(input: &str) -> ParseResult<'_, &str> {
    ws(alt((tag("*"), eqname))).parse(input)
}

fn kind_test(input: &str) -> ParseResult<'_, ParseNode> {
    alt((any_kind_test, document_test, assembly_test, field_test, flag_test)).parse(input)
}

fn any_kind_test(input: &str) -> ParseResult<'_, ParseNode> {
    map((keyword("node"), sym("("), sym(")")), |_| {
        ParseNode::leaf(Rule::AnyKindTest, "")
    })
    .parse(input)
}

fn document_test(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, _) = pair(keyword("document-node"), sym("(")).parse(input)?;
    let (input, inner) = opt(assembly_test).parse(input)?;
    let (input, _) = sym(")").parse(input)?;
    Ok((
        input,
        ParseNode::branch(Rule::DocumentTest, inner.into_iter().collect()),
    ))
}

fn assembly_test(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, _) = pair(keyword("assembly"), sym("(")).parse(input)?;
    let (input, name) = opt(name_or_wildcard).parse(input)?;
    let (input, _) = sym(")").parse(input)?;
    Ok((input, ParseNode::leaf(Rule::AssemblyTest, name.unwrap_or("*"))))
}

fn typed_node_test<'a>(
    input: &'a str,
    word: &'static str,
    rule: Rule,
) -> ParseResult<'a, ParseNode> {
    let (input, _) = pair(keyword(word), sym("(")).parse(input)?;
    let (input, parts) =
        opt(pair(name_or_wildcard, opt(preceded(sym(","), ws(eqname))))).parse(input)?;
    let (input, _) = sym(")").parse(input)?;
    let node = match parts {
        Some((name, value_type)) => ParseNode::new(
            rule,
            name,
            value_type
                .map(|t| ParseNode::leaf(Rule::AtomicType, t))
                .into_iter()
                .collect(),
        ),
        None => ParseNode::leaf(rule, "*"),
    };
    Ok((input, node))
}

fn field_test(input: &str) -> ParseResult<'_, ParseNode> {
    typed_node_test(input, "field", Rule::FieldTest)
}

fn flag_test(input: &str) -> ParseResult<'_, ParseNode> {
    typed_node_test(input, "flag", Rule::FlagTest)
}

// --- Primary expressions ---

fn primary_expr(input: &str) -> ParseResult<'_, ParseNode> {
    ws(alt((
        numeric_literal,
        string_literal,
        variable_reference,
        parenthesized_expr,
        context_item,
        map_constructor,
        square_array_constructor,
        curly_array_constructor,
        inline_function,
        named_function_ref,
        function_call,
        unary_lookup,
    )))
    .parse(input)
}

fn numeric_literal(input: &str) -> ParseResult<'_, ParseNode> {
    let (rest, node) = alt((
        map(recognize((digit1, char('.'), digit0)), |t| {
            ParseNode::leaf(Rule::DecimalLiteral, t)
        }),
        map(recognize(pair(char('.'), digit1)), |t| {
            ParseNode::leaf(Rule::DecimalLiteral, t)
        }),
        map(digit1, |t| ParseNode::leaf(Rule::IntegerLiteral, t)),
    ))
    .parse(input)?;
    // `1e3`, `3div` and `1.2.3` are not numbers.
    let (rest, _) = not(satisfy(|c| is_name_char(c))).parse(rest)?;
    Ok((rest, node))
}

/// Quoted with `'` or `"`; a doubled quote stands for one quote character.
fn string_literal(input: &str) -> ParseResult<'_, ParseNode> {
    let quote = match input.chars().next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return fail(input, ErrorKind::Char),
    };
    let body = &input[1..];
    let mut text = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        if c == quote {
            if chars.peek().is_some_and(|(_, next)| *next == quote) {
                text.push(quote);
                chars.next();
                continue;
            }
            return Ok((&body[index + 1..], ParseNode::leaf(Rule::StringLiteral, text)));
        }
        text.push(c);
    }
    Err(nom::Err::Failure(Error::new(input, ErrorKind::Char)))
}

fn variable_reference(input: &str) -> ParseResult<'_, ParseNode> {
    map(preceded(sym("$"), eqname), |name| {
        ParseNode::leaf(Rule::VarRef, name)
    })
    .parse(input)
}

fn parenthesized_expr(input: &str) -> ParseResult<'_, ParseNode> {
    map(delimited(sym("("), opt(expr), sym(")")), |inner| {
        inner.unwrap_or_else(|| ParseNode::leaf(Rule::EmptySequence, "()"))
    })
    .parse(input)
}

fn context_item(input: &str) -> ParseResult<'_, ParseNode> {
    map(terminated(char('.'), not(satisfy(|c| c == '.' || c.is_ascii_digit()))), |_| {
        ParseNode::leaf(Rule::ContextItem, ".")
    })
    .parse(input)
}

fn map_constructor(input: &str) -> ParseResult<'_, ParseNode> {
    let entry = map((expr_single, sym(":"), expr_single), |(key, _, value)| {
        ParseNode::branch(Rule::MapEntry, vec![key, value])
    });
    map(
        preceded(
            keyword("map"),
            delimited(sym("{"), separated_list0(sym(","), entry), sym("}")),
        ),
        |entries| ParseNode::branch(Rule::MapConstructor, entries),
    )
    .parse(input)
}

fn square_array_constructor(input: &str) -> ParseResult<'_, ParseNode> {
    map(
        delimited(sym("["), separated_list0(sym(","), expr_single), sym("]")),
        |members| ParseNode::branch(Rule::SquareArray, members),
    )
    .parse(input)
}

fn curly_array_constructor(input: &str) -> ParseResult<'_, ParseNode> {
    map(
        preceded(keyword("array"), delimited(sym("{"), opt(expr), sym("}"))),
        |content| ParseNode::branch(Rule::CurlyArray, content.into_iter().collect()),
    )
    .parse(input)
}

fn param(input: &str) -> ParseResult<'_, ParseNode> {
    map(
        (sym("$"), eqname, opt(preceded(keyword("as"), sequence_type))),
        |(_, name, declared)| ParseNode::new(Rule::Param, name, declared.into_iter().collect()),
    )
    .parse(input)
}

fn inline_function(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, _) = keyword("function").parse(input)?;
    let (input, mut children) =
        delimited(sym("("), separated_list0(sym(","), param), sym(")")).parse(input)?;
    let (input, return_type) = opt(preceded(keyword("as"), sequence_type)).parse(input)?;
    let (input, body) = delimited(sym("{"), opt(expr), sym("}")).parse(input)?;
    if let Some(t) = return_type {
        children.push(ParseNode::branch(Rule::ReturnType, vec![t]));
    }
    children.push(ParseNode::branch(
        Rule::FunctionBody,
        body.into_iter().collect(),
    ));
    Ok((input, ParseNode::branch(Rule::InlineFunction, children)))
}

fn named_function_ref(input: &str) -> ParseResult<'_, ParseNode> {
    map((eqname, sym("#"), digit1), |(name, _, arity)| {
        ParseNode::new(
            Rule::NamedFunctionRef,
            name,
            vec![ParseNode::leaf(Rule::IntegerLiteral, arity)],
        )
    })
    .parse(input)
}

fn function_call(input: &str) -> ParseResult<'_, ParseNode> {
    let (rest, name) = eqname(input)?;
    if is_reserved(name) {
        return fail(input, ErrorKind::Verify);
    }
    let (rest, _) = peek(sym("(")).parse(rest)?;
    let (rest, args) = argument_list(rest)?;
    Ok((rest, ParseNode::new(Rule::FunctionCall, name, args)))
}

fn unary_lookup(input: &str) -> ParseResult<'_, ParseNode> {
    map(preceded(sym("?"), key_specifier), |key| {
        ParseNode::branch(Rule::UnaryLookup, vec![key])
    })
    .parse(input)
}

fn key_specifier(input: &str) -> ParseResult<'_, ParseNode> {
    ws(alt((
        map(tag("*"), |_| ParseNode::leaf(Rule::KeyWildcard, "*")),
        map(digit1, |t| ParseNode::leaf(Rule::KeyInteger, t)),
        map(nc_name, |t| ParseNode::leaf(Rule::KeyName, t)),
        map(delimited(sym("("), opt(expr), sym(")")), |e| {
            ParseNode::branch(Rule::KeyParenthesized, e.into_iter().collect())
        }),
    )))
    .parse(input)
}

// --- Types ---

fn sequence_type(input: &str) -> ParseResult<'_, ParseNode> {
    alt((
        map((keyword("empty-sequence"), sym("("), sym(")")), |_| {
            ParseNode::leaf(Rule::EmptySequenceType, "empty-sequence()")
        }),
        map(
            pair(item_type, opt(ws(alt((tag("?"), tag("*"), tag("+")))))),
            |(item, occurrence)| {
                let mut children = vec![item];
                if let Some(indicator) = occurrence {
                    children.push(ParseNode::leaf(Rule::Occurrence, indicator));
                }
                ParseNode::branch(Rule::SequenceType, children)
            },
        ),
    ))
    .parse(input)
}

fn item_type(input: &str) -> ParseResult<'_, ParseNode> {
    alt((
        kind_test,
        map((keyword("item"), sym("("), sym(")")), |_| {
            ParseNode::leaf(Rule::AnyItemType, "item()")
        }),
        function_test,
        map_test,
        array_test,
        delimited(sym("("), item_type, sym(")")),
        map(ws(eqname), |name| ParseNode::leaf(Rule::AtomicType, name)),
    ))
    .parse(input)
}

fn function_test(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, _) = pair(keyword("function"), sym("(")).parse(input)?;
    if let Ok((input, _)) = pair(sym("*"), sym(")")).parse(input) {
        return Ok((input, ParseNode::leaf(Rule::AnyFunctionTest, "function(*)")));
    }
    let (input, mut children) = separated_list0(sym(","), sequence_type).parse(input)?;
    let (input, _) = sym(")").parse(input)?;
    let (input, result) = preceded(keyword("as"), sequence_type).parse(input)?;
    children.push(ParseNode::branch(Rule::ReturnType, vec![result]));
    Ok((input, ParseNode::branch(Rule::TypedFunctionTest, children)))
}

fn map_test(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, _) = pair(keyword("map"), sym("(")).parse(input)?;
    alt((
        map(pair(sym("*"), sym(")")), |_| {
            ParseNode::leaf(Rule::AnyMapTest, "map(*)")
        }),
        map(
            (ws(eqname), sym(","), sequence_type, sym(")")),
            |(key, _, value, _)| {
                ParseNode::branch(
                    Rule::TypedMapTest,
                    vec![ParseNode::leaf(Rule::AtomicType, key), value],
                )
            },
        ),
    ))
    .parse(input)
}

fn array_test(input: &str) -> ParseResult<'_, ParseNode> {
    let (input, _) = pair(keyword("array"), sym("(")).parse(input)?;
    alt((
        map(pair(sym("*"), sym(")")), |_| {
            ParseNode::leaf(Rule::AnyArrayTest, "array(*)")
        }),
        map(terminated(sequence_type, sym(")")), |member| {
            ParseNode::branch(Rule::TypedArrayTest, vec![member])
        }),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::super::{parse, parse_sequence_type};
    use super::*;
    use crate::error::ErrorCode;

    fn rule_of(text: &str) -> Rule {
        parse(text).unwrap().rule()
    }

    #[test]
    fn test_literals() {
        let node = parse("'it''s'").unwrap();
        assert_eq!(node.rule(), Rule::StringLiteral);
        assert_eq!(node.text(), "it's");
        assert_eq!(rule_of("42"), Rule::IntegerLiteral);
        assert_eq!(rule_of("4.2"), Rule::DecimalLiteral);
        assert_eq!(rule_of(".5"), Rule::DecimalLiteral);
        assert_eq!(rule_of("()"), Rule::EmptySequence);
    }

    #[test]
    fn test_operator_precedence() {
        let node = parse("1 + 2 * 3 = 7 or false()").unwrap();
        assert_eq!(node.rule(), Rule::Or);
        let comparison = &node.children()[0];
        assert_eq!(comparison.rule(), Rule::Comparison);
        let sum = &comparison.children()[0];
        assert_eq!(sum.text(), "+");
        assert_eq!(sum.children()[1].text(), "*");
    }

    #[test]
    fn test_paths() {
        assert_eq!(rule_of("/"), Rule::RootSlashOnly);
        assert_eq!(rule_of("/root/f"), Rule::RootSlash);
        assert_eq!(rule_of("//f"), Rule::RootDoubleSlash);
        let node = parse("a//b/@id").unwrap();
        assert_eq!(node.rule(), Rule::RelativeSlash);
        assert_eq!(node.children()[0].rule(), Rule::RelativeDoubleSlash);
        let flag = &node.children()[1];
        assert_eq!(flag.rule(), Rule::AxisStep);
        assert_eq!(flag.text(), "flag");
        assert_eq!(flag.children()[0].text(), "id");
    }

    #[test]
    fn test_steps_and_kind_tests() {
        let node = parse("..").unwrap();
        assert_eq!(node.text(), "parent");
        let node = parse("descendant::field(title, meta:string)[1]").unwrap();
        assert_eq!(node.text(), "descendant");
        let test = &node.children()[0];
        assert_eq!(test.rule(), Rule::FieldTest);
        assert_eq!(test.text(), "title");
        assert_eq!(test.children()[0].text(), "meta:string");
        assert_eq!(node.children()[1].rule(), Rule::Predicate);
        assert_eq!(parse("*:x").unwrap().children()[0].text(), "*:x");
    }

    #[test]
    fn test_function_forms() {
        let call = parse("fn:count((1, 2))").unwrap();
        assert_eq!(call.rule(), Rule::FunctionCall);
        assert_eq!(call.children()[0].rule(), Rule::Expr);
        assert_eq!(rule_of("count#1"), Rule::NamedFunctionRef);
        assert_eq!(rule_of("function($a) { $a }"), Rule::InlineFunction);
        assert_eq!(rule_of("$f(1)"), Rule::DynamicCall);
        let arrow = parse("'a' => upper-case()").unwrap();
        assert_eq!(arrow.children()[1].rule(), Rule::ArrowStaticCall);
    }

    #[test]
    fn test_constructors_and_lookup() {
        assert_eq!(rule_of("map { 'a': 1, 'b': 2 }"), Rule::MapConstructor);
        assert_eq!(rule_of("[1, (2, 3)]"), Rule::SquareArray);
        assert_eq!(rule_of("array { 1, 2 }"), Rule::CurlyArray);
        let lookup = parse("$m?key").unwrap();
        assert_eq!(lookup.rule(), Rule::Lookup);
        assert_eq!(lookup.children()[1].rule(), Rule::KeyName);
    }

    #[test]
    fn test_bindings_and_conditionals() {
        let node = parse("let $a := 1, $b := 2 return $a + $b").unwrap();
        assert_eq!(node.rule(), Rule::Let);
        assert_eq!(node.children().len(), 3);
        assert_eq!(rule_of("for $x in (1, 2) return $x"), Rule::For);
        assert_eq!(parse("every $x in () satisfies $x").unwrap().text(), "every");
        assert_eq!(rule_of("if (1) then 2 else 3"), Rule::If);
    }

    #[test]
    fn test_comments_are_whitespace() {
        assert_eq!(rule_of("(: outer (: nested :) :) 1 (: trailing :)"), Rule::IntegerLiteral);
        assert!(parse("1 (: open").is_err());
    }

    #[test]
    fn test_type_expressions() {
        let node = parse("$x instance of meta:string*").unwrap();
        let sequence_type = &node.children()[1];
        assert_eq!(sequence_type.children()[1].text(), "*");
        assert_eq!(rule_of("1 castable as integer?"), Rule::Castable);
        let map_type = parse_sequence_type("map(meta:string, item()*)").unwrap();
        assert_eq!(map_type.children()[0].rule(), Rule::TypedMapTest);
        assert_eq!(
            parse_sequence_type("empty-sequence()").unwrap().rule(),
            Rule::EmptySequenceType
        );
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["1 +", "(1, 2", "'open", "1e3", "/root/[", "map { 1 }"] {
            let err = parse(bad).unwrap_err();
            assert_eq!(err.code(), ErrorCode::XPST0003, "{bad}");
        }
    }

    #[test]
    fn test_name_character_boundaries() {
        assert_eq!(rule_of("order"), Rule::AxisStep);
        assert_eq!(rule_of("a-b"), Rule::AxisStep);
        assert_eq!(parse("a - b").unwrap().text(), "-");
    }
}
