//! Built-in cases used when no approved submission is assigned to a date.

use crate::{
  case::{CaseContent, CaseSource, DEFAULT_LABELS, Labels},
  keys::DateKey,
  submission::CaseSubmission,
};

pub struct SeedCase {
  pub title:  &'static str,
  pub text:   &'static str,
  pub labels: [&'static str; 4],
}

impl SeedCase {
  pub fn content(&self) -> CaseContent {
    CaseContent {
      title:      self.title.to_owned(),
      text:       self.text.to_owned(),
      labels:     self.labels.map(String::from),
      source:     CaseSource::Seed,
      created_by: SYSTEM_AUTHOR.to_owned(),
    }
  }
}

pub const SYSTEM_AUTHOR: &str = "system";

/// The seed played on `date`. The deck rotates by day of year.
pub fn seed_for(date: DateKey) -> &'static SeedCase {
  &SEED_CASES[date.day_of_year() as usize % SEED_CASES.len()]
}

/// Case content built from an approved submission.
pub fn submission_content(sub: &CaseSubmission) -> CaseContent {
  let labels: Labels = sub
    .labels_override
    .clone()
    .unwrap_or_else(|| DEFAULT_LABELS.map(String::from));
  CaseContent {
    title: sub
      .title
      .clone()
      .unwrap_or_else(|| format!("A Case from u/{}", sub.username)),
    text: sub.text.clone(),
    labels,
    source: CaseSource::User,
    created_by: sub.user_id.clone(),
  }
}

pub static SEED_CASES: &[SeedCase] = &[
  SeedCase {
    title:  "The Borrowed Ladder",
    text:   "Your neighbour borrowed your ladder last spring and never returned \
             it. You spot it leaning against their shed, so while they are \
             away for the weekend you quietly take it back without a word.",
    labels: ["Fair Enough", "Should Have Asked", "Both Are Wrong", "Petty but Fine"],
  },
  SeedCase {
    title:  "The Group Gift",
    text:   "A coworker organised a group gift and asked everyone for twenty \
             dollars. You later learn the gift cost far less and the organiser \
             kept the difference as a fee for their time.",
    labels: ["Organiser Is Wrong", "It's Their Effort", "Should Have Said", "Nobody Cares"],
  },
  SeedCase {
    title:  "The Spoiled Ending",
    text:   "Your friend has been watching a series for months. At dinner your \
             partner casually mentions how it ends, claiming it has been out \
             long enough that spoilers no longer count.",
    labels: ["Partner Is Wrong", "Fair Game Now", "Friend Overreacts", "Everyone's Wrong"],
  },
  SeedCase {
    title:  "The Reserved Seat",
    text:   "On a long train trip you booked a window seat. A parent asks you to \
             swap so their child can see outside, offering you an aisle seat in \
             the next carriage. You politely decline.",
    labels: ["Right Call", "Wrong Call", "It Depends", "Parent Is Rude"],
  },
  SeedCase {
    title:  "The Found Twenty",
    text:   "You find a twenty dollar note on the floor of a busy supermarket. \
             Nobody nearby seems to be looking for it, so you keep it instead \
             of handing it in at the service desk.",
    labels: ["Finders Keepers", "Hand It In", "It Depends", "Donate It"],
  },
  SeedCase {
    title:  "The Shared Credit",
    text:   "You did most of the work on a project, but in the final meeting your \
             teammate presented it alone and thanked you only briefly. You \
             email the manager listing exactly who did what.",
    labels: ["Right Call", "Too Much", "Talk to Them First", "Everyone's Wrong"],
  },
  SeedCase {
    title:  "The Wedding Plus One",
    text:   "A cousin invites you to their wedding without a plus one, even \
             though you have been with your partner for three years. You decide \
             to skip the wedding and send a gift instead.",
    labels: ["Fair Response", "Just Go Alone", "Ask the Cousin", "Everyone's Wrong"],
  },
  SeedCase {
    title:  "The Tip Jar",
    text:   "A cafe adds a tip prompt to every card payment, even for a bottle of \
             water grabbed from the fridge. You always press no tip and the \
             barista has started to comment on it.",
    labels: ["No Tip Is Fine", "Just Tip", "Barista Is Wrong", "It Depends"],
  },
  SeedCase {
    title:  "The Loud Flatmate",
    text:   "Your flatmate takes work calls on speaker in the shared kitchen every \
             morning. After weeks of asking nicely you start running the blender \
             whenever a call begins.",
    labels: ["Deserved It", "Passive Aggressive", "Both Are Wrong", "Move Out"],
  },
  SeedCase {
    title:  "The Alibi",
    text:   "A close friend asks you to tell their partner they spent Saturday \
             with you. You do not know where they really were, and they insist \
             it is nothing bad. You refuse to cover for them.",
    labels: ["Right Call", "Bad Friend", "Ask Why First", "Everyone's Wrong"],
  },
  SeedCase {
    title:  "The Parking Spot",
    text:   "You wait with your indicator on for a parking spot while another \
             driver reverses out. A cyclist stops in the space and holds it for a \
             friend arriving in a car a minute later.",
    labels: ["Cyclist Is Wrong", "First Come", "Let It Go", "Everyone's Wrong"],
  },
  SeedCase {
    title:  "The Gym Bench",
    text:   "At a crowded gym someone leaves a towel on a bench and goes to use \
             three other machines. After ten minutes you move the towel aside \
             and start your own sets on the bench.",
    labels: ["Right Call", "Wrong Call", "Should Have Asked", "Gym Etiquette Wins"],
  },
  SeedCase {
    title:  "The Recipe Secret",
    text:   "Your grandmother made you promise never to share her famous cake \
             recipe. A friend who has been kind to you for years asks for it to \
             bake for their mother's last birthday.",
    labels: ["Keep the Promise", "Share It", "Bake It for Them", "It Depends"],
  },
  SeedCase {
    title:  "The Honest Review",
    text:   "A friend opened a small restaurant and asks everyone to leave online \
             reviews. Your meal was honestly mediocre, so you leave three stars \
             with polite and specific feedback.",
    labels: ["Honest Is Right", "Should Skip It", "Five Stars Anyway", "Tell Them Privately"],
  },
];

#[cfg(test)]
mod tests {
  use super::*;
  use crate::submission::{MAX_LABEL_CHARS, validate_text};

  #[test]
  fn seeds_are_valid_cases() {
    assert!(SEED_CASES.len() >= 14);
    for seed in SEED_CASES {
      assert!(validate_text(seed.text).is_ok(), "{}", seed.title);
      for label in seed.labels {
        assert!(!label.is_empty() && label.chars().count() <= MAX_LABEL_CHARS);
      }
    }
  }

  #[test]
  fn rotation_is_stable_per_date() {
    let date: DateKey = "20250110".parse().unwrap();
    assert_eq!(seed_for(date).title, SEED_CASES[9].title);
    let before = date.previous().unwrap();
    assert_eq!(seed_for(before).title, SEED_CASES[8].title);
  }
}
