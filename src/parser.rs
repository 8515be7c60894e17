use chrono::NaiveDate;
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_opt, map_res, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::email::template::{TemplateField, TemplateKind};
use crate::model::{NewVisit, VisitStatus};

#[derive(Debug, PartialEq, Clone)]
pub enum FindBy {
    Date(NaiveDate),
    Hotel(String),
    Status(VisitStatus),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Schedule(ScheduleArgs),
    Get { id: String },
    Find(FindBy),
    SetStatus { id: String, status: VisitStatus },
    Delete { id: String },
    Upcoming { days: u32 },
    Today,
    Stats,
    Storage,
    Sweep,
    Maintain,
    Rebuild,
    Export { path: String },
    Import { path: String },
    Hotels { query: String },
    Email { kind: TemplateKind, id: String, fields: Vec<(TemplateField, String)> },
    EmailHistory,
    Help,
    Exit,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ScheduleArgs {
    pub hotel_id: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub duration: Option<u32>,
    pub purpose: Option<String>,
    pub contact: Option<String>,
    pub contact_email: Option<String>,
    pub notes: Option<String>,
}

impl ScheduleArgs {
    pub fn into_new_visit(self, hotel_name: Option<String>) -> NewVisit {
        NewVisit {
            date: self.date,
            time: self.time,
            duration: self.duration,
            hotel_id: self.hotel_id,
            hotel_name,
            purpose: self.purpose,
            contact_person: self.contact,
            contact_email: self.contact_email,
            notes: self.notes,
        }
    }
}

pub const DEFAULT_UPCOMING_DAYS: u32 = 30;

// --- BASIC PARSERS ---

fn parse_u32(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, content) = take_until("\"")(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, content.to_string()))
}

/// `'visit_123'` or a bare `visit_123`
fn parse_id(input: &str) -> IResult<&str, String> {
    let quoted = delimited(char('\''), take_until("'"), char('\''));
    let bare = take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    map(alt((quoted, bare)), str::to_string)(input)
}

fn parse_date(input: &str) -> IResult<&str, NaiveDate> {
    map_res(
        recognize(tuple((digit1, char('-'), digit1, char('-'), digit1))),
        |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d"),
    )(input)
}

fn parse_time(input: &str) -> IResult<&str, String> {
    map(recognize(tuple((digit1, char(':'), digit1))), str::to_string)(input)
}

fn parse_status(input: &str) -> IResult<&str, VisitStatus> {
    map_res(take_while1(|c: char| c.is_ascii_alphabetic()), |s: &str| s.parse::<VisitStatus>())(input)
}

// --- HELPERS ---
fn ws<'a, F, O, E: nom::error::ParseError<&'a str>>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where F: FnMut(&'a str) -> IResult<&'a str, O, E> {
    delimited(multispace0, inner, multispace0)
}

fn tag_ci(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| tag_no_case(t)(input)
}

/// Keyword followed by at least one space
fn keyword(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| {
        let (input, word) = tag_no_case(t)(input)?;
        let (input, _) = multispace1(input)?;
        Ok((input, word))
    }
}

// --- COMMAND PARSERS ---

enum ScheduleOpt {
    At(String),
    For(u32),
    Purpose(String),
    Contact(String),
    Email(String),
    Notes(String),
}

fn parse_schedule_opt(input: &str) -> IResult<&str, ScheduleOpt> {
    preceded(
        multispace1,
        alt((
            map(preceded(keyword("AT"), parse_time), ScheduleOpt::At),
            map(preceded(keyword("FOR"), parse_u32), ScheduleOpt::For),
            map(preceded(keyword("PURPOSE"), parse_quoted_string), ScheduleOpt::Purpose),
            map(preceded(keyword("CONTACT"), parse_quoted_string), ScheduleOpt::Contact),
            map(preceded(keyword("EMAIL"), parse_quoted_string), ScheduleOpt::Email),
            map(preceded(keyword("NOTES"), parse_quoted_string), ScheduleOpt::Notes),
        )),
    )(input)
}

fn parse_schedule(input: &str) -> IResult<&str, Command> {
    let (input, _) = keyword("SCHEDULE")(input)?;
    let (input, _) = opt(keyword("HOTEL"))(input)?;
    let (input, hotel_id) = parse_id(input)?;
    let (input, _) = ws(tag_ci("ON"))(input)?;
    let (input, date) = parse_date(input)?;
    let (input, opts) = many0(parse_schedule_opt)(input)?;

    let mut args = ScheduleArgs {
        hotel_id,
        date,
        time: None,
        duration: None,
        purpose: None,
        contact: None,
        contact_email: None,
        notes: None,
    };
    for opt in opts {
        match opt {
            ScheduleOpt::At(t) => args.time = Some(t),
            ScheduleOpt::For(d) => args.duration = Some(d),
            ScheduleOpt::Purpose(p) => args.purpose = Some(p),
            ScheduleOpt::Contact(c) => args.contact = Some(c),
            ScheduleOpt::Email(e) => args.contact_email = Some(e),
            ScheduleOpt::Notes(n) => args.notes = Some(n),
        }
    }
    Ok((input, Command::Schedule(args)))
}

fn parse_get(input: &str) -> IResult<&str, Command> {
    let (input, _) = keyword("GET")(input)?;
    let (input, id) = parse_id(input)?;
    Ok((input, Command::Get { id }))
}

fn parse_find(input: &str) -> IResult<&str, Command> {
    let (input, _) = keyword("FIND")(input)?;
    let (input, _) = opt(keyword("BY"))(input)?;
    let (input, by) = alt((
        map(preceded(keyword("DATE"), parse_date), FindBy::Date),
        map(preceded(keyword("HOTEL"), parse_id), FindBy::Hotel),
        map(preceded(keyword("STATUS"), parse_status), FindBy::Status),
    ))(input)?;
    Ok((input, Command::Find(by)))
}

fn parse_set_status(input: &str) -> IResult<&str, Command> {
    let (input, _) = keyword("SET")(input)?;
    let (input, _) = keyword("STATUS")(input)?;
    let (input, id) = parse_id(input)?;
    let (input, _) = opt(ws(char('=')))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, status) = parse_status(input)?;
    Ok((input, Command::SetStatus { id, status }))
}

fn parse_delete(input: &str) -> IResult<&str, Command> {
    let (input, _) = keyword("DELETE")(input)?;
    let (input, id) = parse_id(input)?;
    Ok((input, Command::Delete { id }))
}

fn parse_upcoming(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("UPCOMING")(input)?;
    let (input, days) = opt(preceded(multispace1, parse_u32))(input)?;
    Ok((input, Command::Upcoming { days: days.unwrap_or(DEFAULT_UPCOMING_DAYS) }))
}

fn parse_path_command(input: &str) -> IResult<&str, Command> {
    alt((
        map(preceded(keyword("EXPORT"), parse_quoted_string), |path| Command::Export { path }),
        map(preceded(keyword("IMPORT"), parse_quoted_string), |path| Command::Import { path }),
    ))(input)
}

fn parse_hotels(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("HOTELS")(input)?;
    let (input, query) = opt(preceded(multispace1, parse_quoted_string))(input)?;
    Ok((input, Command::Hotels { query: query.unwrap_or_default() }))
}

fn parse_email_field(input: &str) -> IResult<&str, (TemplateField, String)> {
    preceded(
        multispace1,
        pair(
            map_opt(take_while1(|c: char| c.is_ascii_alphanumeric()), TemplateField::from_key),
            preceded(ws(char('=')), parse_quoted_string),
        ),
    )(input)
}

fn parse_email(input: &str) -> IResult<&str, Command> {
    let (input, _) = keyword("EMAIL")(input)?;
    let (input, kind) = map_res(take_while1(|c: char| c.is_ascii_alphabetic()), |s: &str| {
        s.parse::<TemplateKind>()
    })(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_id(input)?;
    let (input, fields) = many0(parse_email_field)(input)?;
    Ok((input, Command::Email { kind, id, fields }))
}

fn parse_email_history(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((
        recognize(pair(keyword("EMAIL"), tag_ci("HISTORY"))),
        tag_ci("EMAILS"),
    ))(input)?;
    Ok((input, Command::EmailHistory))
}

fn parse_simple(input: &str) -> IResult<&str, Command> {
    alt((
        map(tag_ci("TODAY"), |_| Command::Today),
        map(tag_ci("STATS"), |_| Command::Stats),
        map(tag_ci("STORAGE"), |_| Command::Storage),
        map(tag_ci("SWEEP"), |_| Command::Sweep),
        map(tag_ci("MAINTAIN"), |_| Command::Maintain),
        map(tag_ci("REBUILD"), |_| Command::Rebuild),
        map(tag_ci("HELP"), |_| Command::Help),
        map(alt((tag_ci("EXIT"), tag_ci("QUIT"))), |_| Command::Exit),
    ))(input)
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_schedule,
        parse_get,
        parse_find,
        parse_set_status,
        parse_delete,
        parse_upcoming,
        parse_path_command,
        parse_hotels,
        parse_email_history,
        parse_email,
        parse_simple,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder));
            }
            Ok(cmd)
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context: String = e.input.chars().take(20).collect();
            if context.len() < e.input.len() {
                Err(format!("Invalid syntax near: '{}...'", context))
            } else {
                Err(format!("Invalid syntax near: '{}'", context))
            }
        },
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}
