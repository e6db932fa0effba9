// Prompts sent to the vision model

pub const SYSTEM_PROMPT: &str = r#"You read a photo or scan of one Riftbound trading card and return its data as a single JSON object.

Return the JSON object and nothing else. No prose, no markdown, no code fences.

Shape (use null or [] for anything not printed on the card):

{
  "name": "string, including any subtitle printed under the main name",
  "supertypes": ["CHAMPION", "SIGNATURE", "TOKEN"],
  "type": "UNIT | SPELL | GEAR | RUNE | LEGEND | BATTLEFIELD",
  "domain": "FURY | CALM | MIND | BODY | CHAOS | ORDER | null",
  "domains": ["FURY", "CALM", "MIND", "BODY", "CHAOS", "ORDER"],
  "cost": {
    "energy": "integer or null",
    "power": [{"domain": "FURY", "amount": 1}]
  },
  "stats": {"might": null, "damage": null, "armor": null},
  "keywords": ["string"],
  "tags": ["string"],
  "rules_text": "string",
  "effects": [{"effect": "string", "params": {}}],
  "flavor": "string or null",
  "artist": "string or null",
  "card_id": "string or null"
}

Card types:
- A champion unit has type UNIT and CHAMPION in supertypes. Never output "CHAMPION UNIT" as a type.
- A legend has type LEGEND, no CHAMPION supertype, and usually no energy cost (energy null, power []).
- A legend and its champion unit carry the same champion tag, for example "Jinx".

Domains and their colors:
- FURY red, CALM green, MIND blue, BODY orange, CHAOS purple, ORDER gold.
- A card has at most two domains.
- Units and legends show their domains in the frame icons.
- Spells take their domains from the colors of their power icons, in printed order.
- A rune has exactly one domain.
- With one domain set "domain" to it and "domains" to [it]. With two, "domain" is null and "domains" lists both.

Cost:
- "energy" is the number in the upper-left gem, or null when there is none.
- "power" lists the power icons left to right. Identical icons become one entry with their count as "amount".

Keywords keep their numbers as printed ("Assault 2", "Shield 3").
Tags hold champion names, regions and other type-line labels. Never put card types in tags.
"rules_text" is the printed rules text with its line breaks.
"#;

pub const EXTRACT_INSTRUCTION: &str = "Extract the card data as JSON.";

pub const REPAIR_SYSTEM_PROMPT: &str = "You fix invalid JSON. Reply with the corrected JSON object only.";

/// Ask the model to turn its own broken output back into valid JSON.
pub fn repair_prompt(broken: &str) -> String {
    format!(
        "This text should be a JSON object describing a Riftbound card but does not parse \
         (trailing commas, unbalanced brackets or similar). Return only valid JSON holding \
         the same data.\n\n{}",
        broken
    )
}
