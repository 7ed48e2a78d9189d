//! Embedded word lists: stop words and frequency ranks per language.
//!
//! Frequency is expressed on the Zipf scale (log10 of occurrences per
//! billion words). `wordfreq/<lang>.txt` lists the most common words of
//! each language in descending corpus frequency, roughly a thousand per
//! language and more for English. A listed word's Zipf value is estimated
//! from its rank as `7.7 − 0.9 · log10(rank)`. Anything not listed scores 0,
//! the value used for unseen words.
//!
//! Stop lists include elided and clitic forms (`l'`, `qu'`, `'s`, `n't`) as
//! [`RuleTokenizer`](crate::pipeline::vocab::RuleTokenizer) emits them.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

const STOP_EN: &str = "a about above after again against all am an and any are as at be because been \
before being below between both but by can could did do does doing down during each few for from \
further had has have having he her here hers herself him himself his how i if in into is it its \
itself just me more most my myself no nor not now of off on once only or other our ours ourselves \
out over own same she should so some such than that the their theirs them themselves then there \
these they this those through to too under until up very was we were what when where which while \
who whom why will with would you your yours yourself yourselves 's n't 'll 're 've 'd 'm";

const STOP_ES: &str = "a al algo algunas algunos ante antes como con contra cual cuando de del desde \
donde durante e el ella ellas ellos en entre era erais eran eras eres es esa esas ese eso esos esta \
estaba estado estas este esto estos fue fueron fui ha han has hasta hay la las le les lo los mas me \
mi mis mucho muy más mí nada ni no nos nosotros o os otra otro para pero poco por porque que quien \
se sea ser si sin sobre son su sus también te tengo ti tiene tu tus tú un una uno unos y ya yo él";

const STOP_FR: &str = "a ai au aux avec avait c ce ces cette d dans de des du elle elles en est et \
eu il ils j je l la le les leur leurs lui m ma mais me même mes moi mon n ne nos notre nous on ont \
ou où par pas pour qu que qui s sa sans se ses si son sont sur t ta te tes toi ton tu un une vos \
votre vous y à été être était l' d' qu' j' n' s' c' m' t' jusqu' lorsqu' puisqu' \
aujourd' hui";

const STOP_DE: &str = "aber alle als also am an auch auf aus bei bin bis bist da damit dann das dass \
dem den der des dich die dir doch du durch ein eine einem einen einer eines er es für hat hatte \
ich ihm ihn ihr im in ist ja kein man mich mir mit nach nicht noch nur ob oder ohne sich sie sind \
so um und uns unter vom von vor war waren was wenn wer wie wir wird zu zum zur über";

const STOP_IT: &str = "a ad al alla alle anche che chi ci come con da dal dalla degli dei del della \
delle di e ed era gli ha hanno i il in io la le lei lo loro lui ma mi mio ne nei nel nella noi non \
o per perché più quando quella quello questa questo se si sono su sua suo tra tu un una uno è \
l' dell' all' dall' nell' sull' un' d' c' quell' quest' nessun'";

const STOP_PT: &str = "a ao aos as com como da das de dela dele do dos e ela elas ele eles em entre \
era essa esse esta este eu foi foram há isso isto já lhe mais mas me mesmo meu minha muito na nas \
nem no nos não o os ou para pela pelo por qual quando que quem se sem seu sua são também te tem \
um uma você à é d'";

const FREQ_EN: &str = include_str!("wordfreq/en.txt");
const FREQ_ES: &str = include_str!("wordfreq/es.txt");
const FREQ_FR: &str = include_str!("wordfreq/fr.txt");
const FREQ_DE: &str = include_str!("wordfreq/de.txt");
const FREQ_IT: &str = include_str!("wordfreq/it.txt");
const FREQ_PT: &str = include_str!("wordfreq/pt.txt");

fn index(list: &'static str) -> HashSet<&'static str> {
    list.split_whitespace().collect()
}

fn ranks(list: &'static str) -> HashMap<&'static str, usize> {
    let mut out = HashMap::new();
    for (i, w) in list.split_whitespace().enumerate() {
        out.entry(w).or_insert(i + 1);
    }
    out
}

static STOP_WORDS: Lazy<HashMap<&'static str, HashSet<&'static str>>> = Lazy::new(|| {
    HashMap::from([
        ("en", index(STOP_EN)),
        ("es", index(STOP_ES)),
        ("fr", index(STOP_FR)),
        ("de", index(STOP_DE)),
        ("it", index(STOP_IT)),
        ("pt", index(STOP_PT)),
    ])
});

static FREQUENCY_RANKS: Lazy<HashMap<&'static str, HashMap<&'static str, usize>>> =
    Lazy::new(|| {
        HashMap::from([
            ("en", ranks(FREQ_EN)),
            ("es", ranks(FREQ_ES)),
            ("fr", ranks(FREQ_FR)),
            ("de", ranks(FREQ_DE)),
            ("it", ranks(FREQ_IT)),
            ("pt", ranks(FREQ_PT)),
        ])
    });

fn lang_key(lang: &str) -> String {
    lang.split(['-', '_'])
        .next()
        .unwrap_or(lang)
        .to_ascii_lowercase()
}

/// Whether `word` (already case-folded) is a stop word in `lang`.
/// Languages without a list have no stop words.
pub fn is_stop_word(word: &str, lang: &str) -> bool {
    STOP_WORDS
        .get(lang_key(lang).as_str())
        .is_some_and(|set| set.contains(word))
}

/// Estimated Zipf frequency of a case-folded word; 0.0 when unknown.
pub fn zipf_frequency(word: &str, lang: &str) -> f64 {
    FREQUENCY_RANKS
        .get(lang_key(lang).as_str())
        .and_then(|ranks| ranks.get(word))
        .map(|&rank| (7.7 - 0.9 * (rank as f64).log10()).max(0.0))
        .unwrap_or(0.0)
}
