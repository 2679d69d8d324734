use crate::error::TrendError;
use crate::trend::Channel;
use crate::trend::NormalizedTable;
use chrono::NaiveDateTime;
use std::fmt::Display;

/// Selector label that plots every channel
pub const ALL_CHANNELS: &str = "All Channels";
pub const CHART_TITLE: &str = "Historical Trend Graph";
pub const LEGEND_TITLE: &str = "Channels";
pub const X_AXIS_LABEL: &str = "Date & Time";
pub const Y_AXIS_LABEL: &str = "Measurements (mm/s RMS)";

/// Which channels a chart shows.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ChannelSelection {
    #[default]
    All,
    Channel(String),
}

impl ChannelSelection {
    /// Parses a selector label; [`ALL_CHANNELS`] selects every channel.
    pub fn from_label(label: &str) -> Self {
        if label == ALL_CHANNELS {
            Self::All
        } else {
            Self::Channel(label.to_owned())
        }
    }
}

impl Display for ChannelSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "{ALL_CHANNELS}"),
            Self::Channel(name) => write!(f, "{name}"),
        }
    }
}

/// Selector labels for a table: [`ALL_CHANNELS`] followed by channel names
pub fn selection_labels(table: &NormalizedTable) -> Vec<String> {
    std::iter::once(ALL_CHANNELS.to_owned())
        .chain(table.channels().iter().map(|channel| channel.name.to_owned()))
        .collect()
}

/// One line of a chart: a channel's samples against the shared index.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: Vec<(Option<NaiveDateTime>, Option<f64>)>,
}

impl Series {
    fn new(timestamps: &[Option<NaiveDateTime>], channel: &Channel) -> Self {
        Self {
            name: channel.name.to_owned(),
            points: timestamps.iter().copied().zip(channel.samples.iter().copied()).collect(),
        }
    }

    /// Points with both a timestamp and a value; the gaps a chart leaves out
    pub fn plottable(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.points.iter().filter_map(|(timestamp, value)| timestamp.zip(*value))
    }
}

impl NormalizedTable {
    /// Series for the selected channels, in table order.
    ///
    /// # Errors
    ///
    /// [`TrendError::UnknownChannel`] when a single channel is selected that
    /// the table does not have.
    pub fn series(&self, selection: &ChannelSelection) -> Result<Vec<Series>, TrendError> {
        match selection {
            ChannelSelection::All => Ok(self.channels()
                .iter()
                .map(|channel| Series::new(self.timestamps(), channel))
                .collect()),
            ChannelSelection::Channel(name) => self.channel(name)
                .map(|channel| vec![Series::new(self.timestamps(), channel)])
                .ok_or_else(|| TrendError::UnknownChannel(name.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datetime(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn table() -> NormalizedTable {
        NormalizedTable::new(
            vec![Some(datetime("2024-01-01 00:00:00")), None, Some(datetime("2024-01-01 00:00:20"))],
            vec![
                Channel { name: "Channel 1".to_owned(), samples: vec![Some(1.0), Some(2.0), None] },
                Channel { name: "Channel 2".to_owned(), samples: vec![Some(3.0), Some(4.0), Some(5.0)] },
            ],
        )
    }

    #[test]
    fn labels_start_with_all_channels() {
        assert_eq!(selection_labels(&table()), vec!["All Channels", "Channel 1", "Channel 2"]);
        assert_eq!(selection_labels(&NormalizedTable::default()), vec!["All Channels"]);
    }

    #[test]
    fn selection_round_trips_through_labels() {
        assert_eq!(ChannelSelection::from_label("All Channels"), ChannelSelection::All);
        let selection = ChannelSelection::from_label("Channel 2");
        assert_eq!(selection, ChannelSelection::Channel("Channel 2".to_owned()));
        assert_eq!(selection.to_string(), "Channel 2");
    }

    #[test]
    fn all_channels_yield_one_series_each() {
        let series = table().series(&ChannelSelection::All).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|series| series.points.len() == 3));
        assert_eq!(series[1].points[1], (None, Some(4.0)));
    }

    #[test]
    fn plottable_points_skip_gaps() {
        let series = table().series(&ChannelSelection::from_label("Channel 1")).unwrap();
        assert_eq!(series.len(), 1);
        let points: Vec<(NaiveDateTime, f64)> = series[0].plottable().collect();
        assert_eq!(points, vec![(datetime("2024-01-01 00:00:00"), 1.0)]);
    }

    #[test]
    fn unknown_channel_is_an_error() {
        let error = table().series(&ChannelSelection::from_label("Channel 9")).unwrap_err();
        assert!(matches!(error, TrendError::UnknownChannel(name) if name == "Channel 9"));
    }
}
