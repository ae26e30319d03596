use ndarray::ArrayView1;

/// Output labels of the tagging head, in model output order.
pub const TAGS: [&str; 50] = [
    "genre---downtempo",
    "genre---ambient",
    "genre---rock",
    "instrument---synthesizer",
    "genre---atmospheric",
    "genre---indie",
    "instrument---electricpiano",
    "genre---newage",
    "instrument---strings",
    "instrument---drums",
    "instrument---drummachine",
    "genre---techno",
    "instrument---guitar",
    "genre---alternative",
    "genre---easylistening",
    "genre---instrumentalpop",
    "genre---chillout",
    "genre---metal",
    "mood/theme---happy",
    "genre---lounge",
    "genre---reggae",
    "genre---popfolk",
    "genre---orchestral",
    "instrument---acousticguitar",
    "genre---poprock",
    "instrument---piano",
    "genre---trance",
    "genre---dance",
    "instrument---electricguitar",
    "genre---soundtrack",
    "genre---house",
    "genre---hiphop",
    "genre---classical",
    "mood/theme---energetic",
    "genre---electronic",
    "genre---world",
    "genre---experimental",
    "instrument---violin",
    "genre---folk",
    "mood/theme---emotional",
    "instrument---voice",
    "instrument---keyboard",
    "genre---pop",
    "instrument---bass",
    "instrument---computer",
    "mood/theme---film",
    "genre---triphop",
    "genre---jazz",
    "genre---funk",
    "mood/theme---relaxing",
];

/// The `k` most probable tags, highest first. Extra scores beyond the
/// vocabulary are ignored.
pub fn top_tags(probs: ArrayView1<f32>, k: usize) -> Vec<(&'static str, f32)> {
    let mut scored: Vec<(&'static str, f32)> = TAGS.iter().copied().zip(probs.iter().copied()).collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}
