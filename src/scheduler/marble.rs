//! Marble diagrams: a compact string notation for timed notifications.
//!
//! | token | meaning |
//! |-------|---------|
//! | ` ` | ignored; in run mode it must precede a duration token |
//! | `-` | one frame passes |
//! | `(` `)` | group: every notification inside lands on the frame of `(` |
//! | `^` | subscription point (hot and subscription diagrams) |
//! | `!` | unsubscription point (subscription diagrams only) |
//! | `\|` | completion |
//! | `#` | error, using the supplied error value |
//! | `N(.M)?(ms\|s\|m)` + space | in run mode, `N` units of time pass |
//! | anything else | a `Next` value looked up in the values map |
//!
//! Each token, the group brackets included, advances time by one frame;
//! `!` and spaces never do. Frames are expressed in virtual milliseconds,
//! `frame_time_factor` per token.

use std::collections::HashMap;

use thiserror::Error;

use crate::notification::Notification;

pub const DEFAULT_FRAME_TIME_FACTOR: u64 = 10;

/// A notification stamped with the virtual time it happens at. Hot diagrams
/// can produce negative frames for notifications before `^`.
#[derive(Clone, Debug, PartialEq)]
pub struct TestMessage<Item, Err> {
  pub frame: i64,
  pub notification: Notification<Item, Err>,
}

impl<Item, Err> TestMessage<Item, Err> {
  pub fn new(frame: i64, notification: Notification<Item, Err>) -> Self {
    TestMessage { frame, notification }
  }

  pub fn next(frame: i64, value: Item) -> Self { Self::new(frame, Notification::Next(value)) }

  pub fn error(frame: i64, err: Err) -> Self { Self::new(frame, Notification::Error(err)) }

  pub fn complete(frame: i64) -> Self { Self::new(frame, Notification::Complete) }
}

/// When a test observable was subscribed and unsubscribed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionLog {
  pub subscribed_frame: u64,
  pub unsubscribed_frame: u64,
}

impl SubscriptionLog {
  /// Frame value meaning "never".
  pub const INFINITE: u64 = u64::MAX;

  pub fn new(subscribed_frame: u64) -> Self {
    SubscriptionLog { subscribed_frame, unsubscribed_frame: Self::INFINITE }
  }

  pub fn with_unsubscribed(subscribed_frame: u64, unsubscribed_frame: u64) -> Self {
    SubscriptionLog { subscribed_frame, unsubscribed_frame }
  }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarbleError {
  #[error("unsubscription point '!' is only valid in subscription diagrams: `{0}`")]
  UnexpectedUnsubscription(String),
  #[error("cold observable cannot have a subscription offset '^': `{0}`")]
  ColdSubscriptionOffset(String),
  #[error("found a second subscription point '^' in `{0}`, there can only be one")]
  DuplicateSubscription(String),
  #[error("found a second unsubscription point '!' in `{0}`, there can only be one")]
  DuplicateUnsubscription(String),
  #[error(
    "there can only be '^' and '!' markers in a subscription diagram, \
     found '{token}' in `{marbles}`"
  )]
  InvalidSubscriptionToken { marbles: String, token: char },
  #[error("no value given for marble '{0}'")]
  UnknownValue(char),
  #[error("marble diagram `{0}` has an error '#' but no error value was given")]
  MissingErrorValue(String),
  #[error("time diagram `{0}` must contain exactly one completion marker '|'")]
  InvalidTimeDiagram(String),
  #[error("notification at frame {0} cannot be written as a marble diagram")]
  Unrepresentable(i64),
}

/// Looks up the value a marble token stands for.
pub trait MarbleValues<T> {
  fn value(&self, token: char) -> Option<T>;
}

impl<T: Clone, S: std::hash::BuildHasher> MarbleValues<T> for HashMap<char, T, S> {
  fn value(&self, token: char) -> Option<T> { self.get(&token).cloned() }
}

impl<T: Clone> MarbleValues<T> for [(char, T)] {
  fn value(&self, token: char) -> Option<T> {
    self.iter().find(|(c, _)| *c == token).map(|(_, v)| v.clone())
  }
}

impl<T: Clone, const N: usize> MarbleValues<T> for [(char, T); N] {
  fn value(&self, token: char) -> Option<T> { self.as_slice().value(token) }
}

impl<T: Clone> MarbleValues<T> for Vec<(char, T)> {
  fn value(&self, token: char) -> Option<T> { self.as_slice().value(token) }
}

/// Uses the token itself as the value.
#[derive(Clone, Copy, Debug, Default)]
pub struct Literal;

impl MarbleValues<char> for Literal {
  fn value(&self, token: char) -> Option<char> { Some(token) }
}

impl MarbleValues<String> for Literal {
  fn value(&self, token: char) -> Option<String> { Some(token.to_string()) }
}

/// How a diagram is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarbleOptions {
  pub frame_time_factor: u64,
  pub run_mode: bool,
}

impl Default for MarbleOptions {
  fn default() -> Self {
    MarbleOptions { frame_time_factor: DEFAULT_FRAME_TIME_FACTOR, run_mode: false }
  }
}

impl MarbleOptions {
  pub fn run_mode() -> Self { MarbleOptions { frame_time_factor: 1, run_mode: true } }
}

/// Reads a run-mode duration token (`10ms `, `1.5s `, `2m `) starting at
/// `chars[at]`. Returns its length in characters, trailing space included,
/// and the duration in milliseconds.
fn duration_token(chars: &[char], at: usize) -> Option<(usize, f64)> {
  if at > 0 && chars[at - 1] != ' ' {
    return None;
  }
  let mut i = at;
  let digits = |i: &mut usize| {
    let start = *i;
    while chars.get(*i).is_some_and(|c| c.is_ascii_digit()) {
      *i += 1;
    }
    *i > start
  };
  if !digits(&mut i) {
    return None;
  }
  if chars.get(i) == Some(&'.') {
    let mut j = i + 1;
    if digits(&mut j) {
      i = j;
    }
  }
  let number: String = chars[at..i].iter().collect();
  let number: f64 = number.parse().ok()?;
  let (unit_len, scale) = match (chars.get(i), chars.get(i + 1)) {
    (Some('m'), Some('s')) => (2, 1.0),
    (Some('s'), _) => (1, 1000.0),
    (Some('m'), _) => (1, 60_000.0),
    _ => return None,
  };
  if chars.get(i + unit_len) != Some(&' ') {
    return None;
  }
  Some((i + unit_len + 1 - at, number * scale))
}

/// Parses a value diagram into timed notifications.
///
/// If the diagram has a `^`, frames are relative to it, so notifications
/// before the subscription point get negative frames.
pub fn parse_marbles<T, E, V>(
  marbles: &str, values: &V, error: Option<E>, options: MarbleOptions,
) -> Result<Vec<TestMessage<T, E>>, MarbleError>
where
  V: MarbleValues<T> + ?Sized,
  E: Clone,
{
  if marbles.contains('!') {
    return Err(MarbleError::UnexpectedUnsubscription(marbles.to_owned()));
  }
  let factor = options.frame_time_factor as i64;
  let chars: Vec<char> = marbles.chars().collect();
  let mut messages = vec![];
  let mut frame: i64 = 0;
  let mut group_start: Option<i64> = None;
  let mut sub_frame: Option<i64> = None;

  let mut i = 0;
  while i < chars.len() {
    let c = chars[i];
    let mut next_frame = frame + factor;
    let mut notification = None;
    match c {
      ' ' => next_frame = frame,
      '-' => {}
      '(' => group_start = Some(frame),
      ')' => group_start = None,
      '^' => {
        if sub_frame.is_some() {
          return Err(MarbleError::DuplicateSubscription(marbles.to_owned()));
        }
        sub_frame = Some(group_start.unwrap_or(frame));
      }
      '|' => notification = Some(Notification::Complete),
      '#' => {
        let err = error.clone().ok_or_else(|| MarbleError::MissingErrorValue(marbles.to_owned()))?;
        notification = Some(Notification::Error(err));
      }
      _ => match duration_token(&chars, i).filter(|_| options.run_mode && c.is_ascii_digit()) {
        Some((len, ms)) => {
          i += len - 1;
          next_frame = frame + ms.round() as i64;
        }
        None => {
          let value = values.value(c).ok_or(MarbleError::UnknownValue(c))?;
          notification = Some(Notification::Next(value));
        }
      },
    }
    if let Some(notification) = notification {
      messages.push(TestMessage { frame: group_start.unwrap_or(frame), notification });
    }
    frame = next_frame;
    i += 1;
  }

  if let Some(offset) = sub_frame {
    for message in messages.iter_mut() {
      message.frame -= offset;
    }
  }
  Ok(messages)
}

/// Parses a subscription diagram (`^` and `!` only).
///
/// A diagram without `^` never subscribes; one without `!` never
/// unsubscribes.
pub fn parse_marbles_as_subscriptions(
  marbles: &str, options: MarbleOptions,
) -> Result<SubscriptionLog, MarbleError> {
  let factor = options.frame_time_factor;
  let chars: Vec<char> = marbles.chars().collect();
  let mut frame: u64 = 0;
  let mut group_start: Option<u64> = None;
  let mut subscribed: Option<u64> = None;
  let mut unsubscribed: Option<u64> = None;

  let mut i = 0;
  while i < chars.len() {
    let c = chars[i];
    let mut next_frame = frame + factor;
    match c {
      ' ' => next_frame = frame,
      '-' => {}
      '(' => group_start = Some(frame),
      ')' => group_start = None,
      '^' => {
        if subscribed.is_some() {
          return Err(MarbleError::DuplicateSubscription(marbles.to_owned()));
        }
        subscribed = Some(group_start.unwrap_or(frame));
      }
      '!' => {
        if unsubscribed.is_some() {
          return Err(MarbleError::DuplicateUnsubscription(marbles.to_owned()));
        }
        unsubscribed = Some(group_start.unwrap_or(frame));
        next_frame = frame;
      }
      _ => match duration_token(&chars, i).filter(|_| options.run_mode && c.is_ascii_digit()) {
        Some((len, ms)) => {
          i += len - 1;
          next_frame = frame + ms.round() as u64;
        }
        None => {
          let marbles = marbles.to_owned();
          return Err(MarbleError::InvalidSubscriptionToken { marbles, token: c });
        }
      },
    }
    frame = next_frame;
    i += 1;
  }

  Ok(SubscriptionLog {
    subscribed_frame: subscribed.unwrap_or(SubscriptionLog::INFINITE),
    unsubscribed_frame: unsubscribed.unwrap_or(SubscriptionLog::INFINITE),
  })
}

/// Writes `messages` back as a diagram. `token` names each `Next` value.
///
/// Notifications sharing a frame become a group. Frames that are negative,
/// not a multiple of `frame_time_factor`, or covered by a preceding group
/// cannot be written and are reported as [`MarbleError::Unrepresentable`].
pub fn serialize_marbles<T, E>(
  messages: &[TestMessage<T, E>], frame_time_factor: u64, token: impl Fn(&T) -> char,
) -> Result<String, MarbleError> {
  let factor = frame_time_factor as i64;
  let mut sorted: Vec<&TestMessage<T, E>> = messages.iter().collect();
  sorted.sort_by_key(|m| m.frame);

  let symbol = |m: &TestMessage<T, E>| match &m.notification {
    Notification::Next(v) => token(v),
    Notification::Error(_) => '#',
    Notification::Complete => '|',
  };

  let mut out = String::new();
  let mut position: i64 = 0;
  let mut idx = 0;
  while idx < sorted.len() {
    let frame = sorted[idx].frame;
    if frame < 0 || factor == 0 || frame % factor != 0 || frame / factor < position {
      return Err(MarbleError::Unrepresentable(frame));
    }
    let slot = frame / factor;
    while position < slot {
      out.push('-');
      position += 1;
    }
    let same: Vec<_> = sorted[idx..].iter().take_while(|m| m.frame == frame).collect();
    if same.len() == 1 {
      out.push(symbol(same[0]));
      position += 1;
    } else {
      out.push('(');
      for m in same.iter() {
        out.push(symbol(m));
      }
      out.push(')');
      position += same.len() as i64 + 2;
    }
    idx += same.len();
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  type Msg = TestMessage<i32, &'static str>;

  fn parse(marbles: &str) -> Vec<Msg> {
    parse_marbles(marbles, &[('a', 1), ('b', 2), ('c', 3)], Some("err"), MarbleOptions::default())
      .unwrap()
  }

  #[test]
  fn subscription_point_inside_a_group_takes_the_group_frame() {
    assert_eq!(parse("-(^a)--b"), [Msg::next(0, 1), Msg::next(60, 2)]);
  }

  #[test]
  fn frames_follow_token_positions() {
    assert_eq!(
      parse("-a-b-|"),
      [Msg::next(10, 1), Msg::next(30, 2), Msg::complete(50)]
    );
  }

  #[test]
  fn spaces_never_advance_time() {
    assert_eq!(parse("- a - b |"), parse("-a-b|"));
  }

  #[test]
  fn groups_share_the_opening_frame() {
    assert_eq!(
      parse("-(ab)-c|"),
      [Msg::next(10, 1), Msg::next(10, 2), Msg::next(60, 3), Msg::complete(70)]
    );
  }

  #[test]
  fn caret_is_frame_zero() {
    assert_eq!(parse("a-^-b-|"), [Msg::next(-20, 1), Msg::next(20, 2), Msg::complete(40)]);
  }

  #[test]
  fn error_needs_a_value() {
    assert_eq!(parse("--#"), [Msg::error(20, "err")]);
    let err = parse_marbles::<i32, &str, _>("-#", &[('a', 1)], None, MarbleOptions::default());
    assert_eq!(err, Err(MarbleError::MissingErrorValue("-#".into())));
  }

  #[test]
  fn unknown_values_are_rejected() {
    let err = parse_marbles::<i32, (), _>("-z|", &[('a', 1)], None, MarbleOptions::default());
    assert_eq!(err, Err(MarbleError::UnknownValue('z')));
  }

  #[test]
  fn value_diagrams_reject_unsubscription() {
    let err = parse_marbles::<i32, (), _>("-a-!", &[('a', 1)], None, MarbleOptions::default());
    assert!(matches!(err, Err(MarbleError::UnexpectedUnsubscription(_))));
  }

  #[test]
  fn literal_values() {
    let messages =
      parse_marbles::<char, (), _>("xy|", &Literal, None, MarbleOptions::default()).unwrap();
    assert_eq!(messages[1], TestMessage::next(10, 'y'));
  }

  #[test]
  fn run_mode_durations() {
    let messages = parse_marbles::<i32, (), _>(
      "a 10ms b 1.5s c 1m |",
      &[('a', 1), ('b', 2), ('c', 3)],
      None,
      MarbleOptions::run_mode(),
    )
    .unwrap();
    let frames: Vec<_> = messages.iter().map(|m| m.frame).collect();
    assert_eq!(frames, [0, 11, 1512, 61_513]);
  }

  #[test]
  fn duration_needs_a_leading_space_in_run_mode() {
    // `a10ms ` is a value followed by values, not a duration
    let options = MarbleOptions::run_mode();
    let err = parse_marbles::<char, (), _>("a10ms ", &[('a', 'a')], None, options);
    assert_eq!(err, Err(MarbleError::UnknownValue('1')));
  }

  #[test]
  fn subscription_diagrams() {
    let opts = MarbleOptions::default();
    assert_eq!(
      parse_marbles_as_subscriptions("--^---!", opts).unwrap(),
      SubscriptionLog::with_unsubscribed(20, 60)
    );
    assert_eq!(parse_marbles_as_subscriptions("^", opts).unwrap(), SubscriptionLog::new(0));
    assert_eq!(
      parse_marbles_as_subscriptions("---", opts).unwrap().subscribed_frame,
      SubscriptionLog::INFINITE
    );
    assert_eq!(
      parse_marbles_as_subscriptions("-(^!)", opts).unwrap(),
      SubscriptionLog::with_unsubscribed(10, 10)
    );
    assert!(matches!(
      parse_marbles_as_subscriptions("^-^", opts),
      Err(MarbleError::DuplicateSubscription(_))
    ));
    assert!(matches!(
      parse_marbles_as_subscriptions("^-!-!", opts),
      Err(MarbleError::DuplicateUnsubscription(_))
    ));
    assert!(matches!(
      parse_marbles_as_subscriptions("^-a-!", opts),
      Err(MarbleError::InvalidSubscriptionToken { token: 'a', .. })
    ));
  }

  #[test]
  fn serialize_then_parse_is_stable() {
    let token = |v: &i32| match v {
      1 => 'a',
      2 => 'b',
      _ => 'c',
    };
    for marbles in ["-a-b-|", "--(ab)-c-#", "a|"] {
      let messages = parse(marbles);
      let text = serialize_marbles(&messages, DEFAULT_FRAME_TIME_FACTOR, token).unwrap();
      assert_eq!(text, marbles);
      assert_eq!(parse(&text), messages);
    }
  }

  #[test]
  fn serialize_rejects_off_grid_frames() {
    let messages = [Msg::next(15, 1)];
    assert_eq!(
      serialize_marbles(&messages, DEFAULT_FRAME_TIME_FACTOR, |_| 'a'),
      Err(MarbleError::Unrepresentable(15))
    );
  }
}
