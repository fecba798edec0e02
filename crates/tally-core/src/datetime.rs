use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Days,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

pub const DAY_FORMAT: &str = "%Y-%m-%d";

const DEFAULT_TIMEZONE: &str = "UTC";

/// Resolves the timezone used to stamp
/// `createdDate`. Unknown or empty ids
/// fall back to UTC, which matches the
/// date portion of an ISO-8601 UTC
/// timestamp.
pub fn resolve_timezone(
  raw: Option<&str>
) -> Tz {
  let source = raw.unwrap_or(
    DEFAULT_TIMEZONE
  );
  parse_timezone(source).unwrap_or_else(
    || {
      tracing::warn!(
        timezone = %source,
        "falling back to UTC"
      );
      chrono_tz::UTC
    }
  )
}

fn parse_timezone(raw: &str) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      "timezone setting was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[must_use]
pub fn today_in(
  tz: &Tz,
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(tz).date_naive()
}

#[must_use]
pub fn format_day(
  day: NaiveDate
) -> String {
  day.format(DAY_FORMAT).to_string()
}

/// Parses a calendar day given on the
/// command line: `YYYY-MM-DD`,
/// `today`, `yesterday`, `tomorrow`, or
/// `N days ago` / `N weeks ago`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_day(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "yesterday" => {
      return today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "date out of range: \
             {token}"
          )
        });
    }
    | "tomorrow" => {
      return today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "date out of range: \
             {token}"
          )
        });
    }
    | _ => {}
  }

  let rel_re = Regex::new(
    r"^(?P<num>\d+)\s*(?P<unit>d|days?|w|weeks?)\s+ago$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let amount: u64 = caps["num"]
      .parse()
      .context("invalid day count")?;
    let days = if caps["unit"]
      .starts_with('w')
    {
      amount.saturating_mul(7)
    } else {
      amount
    };
    return today
      .checked_sub_days(Days::new(days))
      .ok_or_else(|| {
        anyhow!(
          "date out of range: {token}"
        )
      });
  }

  NaiveDate::parse_from_str(
    token, DAY_FORMAT
  )
  .with_context(|| {
    format!(
      "invalid date '{token}', \
       expected YYYY-MM-DD"
    )
  })
}
