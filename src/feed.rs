use std::io::{self, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::ChannelInfo;
use crate::error::FeedError;
use crate::transform::NormalizedRecord;
use crate::xml;

/// Streams an RSS 2.0 document to a sink, one item at a time.
///
/// Nothing is held back between calls apart from what the sink buffers. If a
/// run fails after [`FeedWriter::start`], the document is left without its
/// footer.
pub struct FeedWriter<W: Write> {
    writer: Writer<W>,
    items: usize,
}

impl<W: Write> FeedWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: Writer::new_with_indent(sink, b' ', 2),
            items: 0,
        }
    }

    /// Writes the XML declaration and the channel header.
    pub fn start(&mut self, channel: &ChannelInfo) -> Result<(), FeedError> {
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        self.emit(Event::Start(rss))?;
        self.emit(Event::Start(BytesStart::new("channel")))?;

        self.text_element("title", channel.title.as_bytes())?;
        self.text_element("link", channel.link.as_bytes())?;
        self.text_element("description", channel.description.as_bytes())?;
        Ok(())
    }

    pub fn write_item(&mut self, rec: &NormalizedRecord) -> Result<(), FeedError> {
        self.emit(Event::Start(BytesStart::new("item")))?;
        self.text_element("title", &rec.title)?;
        self.text_element("description", &rec.description)?;
        self.text_element("link", rec.link.as_str().as_bytes())?;

        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        self.emit(Event::Start(guid))?;
        self.emit(Event::Text(BytesText::from_escaped(rec.id.to_string())))?;
        self.emit(Event::End(BytesEnd::new("guid")))?;

        self.text_element("pubDate", rec.published.to_rfc2822().as_bytes())?;
        self.emit(Event::End(BytesEnd::new("item")))?;

        self.items += 1;
        Ok(())
    }

    /// Writes a group of items and flushes the sink.
    pub fn write_batch(&mut self, records: &[NormalizedRecord]) -> Result<(), FeedError> {
        for rec in records {
            self.write_item(rec)?;
        }
        self.flush()
    }

    pub fn flush(&mut self) -> Result<(), FeedError> {
        self.writer.get_mut().flush()?;
        Ok(())
    }

    /// Closes the channel and the document and hands back the sink.
    pub fn finish(mut self) -> Result<W, FeedError> {
        self.emit(Event::End(BytesEnd::new("channel")))?;
        self.emit(Event::End(BytesEnd::new("rss")))?;
        self.writer.get_mut().write_all(b"\n")?;
        self.flush()?;
        Ok(self.writer.into_inner())
    }

    pub fn items(&self) -> usize {
        self.items
    }

    fn text_element(&mut self, name: &str, text: &[u8]) -> Result<(), FeedError> {
        let mut escaped = String::with_capacity(text.len());
        xml::append_escaped_bytes(&mut escaped, text);

        self.emit(Event::Start(BytesStart::new(name)))?;
        self.emit(Event::Text(BytesText::from_escaped(escaped)))?;
        self.emit(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), FeedError> {
        self.writer
            .write_event(event)
            .map_err(|e| FeedError::Output(io::Error::other(e)))
    }
}
